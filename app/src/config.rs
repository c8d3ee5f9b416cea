use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that points the client at another API server.
pub const API_BASE_ENV: &str = "PHOTO_BROWSER_API_BASE";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub log_level: String,
    pub api_base_url: String,
    pub home_per_page: usize,
    pub users_per_page: usize,
    pub albums_per_page: usize,
    pub photos_per_page: usize,
    pub user_albums_per_page: usize,
    pub album_photos_per_page: usize,
    pub oauth_redirect_port: u16,
    pub debug_console: bool,
    pub data_dir: PathBuf,
}

#[derive(Debug, Default)]
pub struct AppConfigOverrides {
    pub log_level: Option<String>,
    pub api_base_url: Option<String>,
    pub oauth_redirect_port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub debug_console: bool,
}

/// Items per page for each listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizes {
    pub home: usize,
    pub users: usize,
    pub albums: usize,
    pub photos: usize,
    pub user_albums: usize,
    pub album_photos: usize,
}

impl Default for PageSizes {
    fn default() -> Self {
        PageSizes {
            home: 10,
            users: 9,
            albums: 9,
            photos: 12,
            user_albums: 10,
            album_photos: 12,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".photo_browser")
}

fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

fn page_size(cfg: &config::Config, key: &str, default: usize) -> usize {
    match cfg.get_int(key) {
        Ok(n) if n > 0 => n as usize,
        _ => default,
    }
}

impl AppConfig {
    pub fn load_from(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(default_config_path);
        let cfg = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .build()
            .unwrap_or_default();

        let sizes = PageSizes::default();
        let log_level = cfg
            .get_string("log_level")
            .unwrap_or_else(|_| "info".to_string());
        let api_base_url = std::env::var(API_BASE_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| cfg.get_string("api_base_url").ok())
            .unwrap_or_else(|| api_client::DEFAULT_BASE_URL.to_string());
        let oauth_redirect_port = cfg.get_int("oauth_redirect_port").unwrap_or(8080) as u16;
        let debug_console = cfg.get_bool("debug_console").unwrap_or(false);
        let data_dir = cfg
            .get_string("data_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        Self {
            log_level,
            api_base_url,
            home_per_page: page_size(&cfg, "home_per_page", sizes.home),
            users_per_page: page_size(&cfg, "users_per_page", sizes.users),
            albums_per_page: page_size(&cfg, "albums_per_page", sizes.albums),
            photos_per_page: page_size(&cfg, "photos_per_page", sizes.photos),
            user_albums_per_page: page_size(&cfg, "user_albums_per_page", sizes.user_albums),
            album_photos_per_page: page_size(&cfg, "album_photos_per_page", sizes.album_photos),
            oauth_redirect_port,
            debug_console,
            data_dir,
        }
    }

    pub fn apply_overrides(mut self, ov: &AppConfigOverrides) -> Self {
        if let Some(l) = &ov.log_level {
            self.log_level = l.clone();
        }
        if let Some(url) = &ov.api_base_url {
            self.api_base_url = url.clone();
        }
        if let Some(p) = ov.oauth_redirect_port {
            self.oauth_redirect_port = p;
        }
        if let Some(dir) = &ov.data_dir {
            self.data_dir = dir.clone();
        }
        if ov.debug_console {
            self.debug_console = true;
        }
        self
    }

    pub fn page_sizes(&self) -> PageSizes {
        PageSizes {
            home: self.home_per_page,
            users: self.users_per_page,
            albums: self.albums_per_page,
            photos: self.photos_per_page,
            user_albums: self.user_albums_per_page,
            album_photos: self.album_photos_per_page,
        }
    }

    /// Write the config as TOML and return the path written.
    pub fn save_to(&self, path: Option<PathBuf>) -> std::io::Result<PathBuf> {
        let path = path.unwrap_or_else(default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(&path, data)?;
        Ok(path)
    }
}
