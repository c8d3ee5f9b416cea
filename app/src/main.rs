//! Terminal browser for placeholder users, albums and photos.

use api_client::ApiClient;
use auth::{AuthProvider, LocalAuthProvider, OAuthPopup, OAuthProviderConfig, Session};
use clap::{Parser, Subcommand};
use pages::{Browser, Outcome};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod config;
mod pages;
mod render;

#[derive(Parser)]
#[command(
    name = "photo_browser",
    author,
    version,
    about = "Browse users, albums and photos from a placeholder API"
)]
struct Cli {
    /// Override log level (e.g. info, debug)
    #[arg(long)]
    log_level: Option<String>,
    /// Override the API base URL
    #[arg(long)]
    api_base_url: Option<String>,
    /// Override OAuth redirect port
    #[arg(long)]
    oauth_redirect_port: Option<u16>,
    /// Directory for the account store and logs
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Enable tokio console for debugging
    #[arg(long)]
    debug_console: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Repeat the password
        #[arg(long)]
        confirm: Option<String>,
    },
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in through Google in the browser
    LoginGoogle,
    /// Sign in through GitHub in the browser
    LoginGithub,
    /// Sign out
    Logout,
    /// Show who is signed in
    Whoami,
    /// Landing page listing every user
    Home {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Users with their album counts
    Users {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// A user's profile and albums
    User {
        id: u64,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// All albums
    Albums {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// An album and its photos
    Album {
        id: u64,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// All photos with their album titles
    Photos {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Photo details
    Photo { id: u64 },
    /// Change a photo's title
    RenamePhoto { id: u64, title: String },
    /// Write the effective configuration to the config file
    ConfigInit,
}

impl Commands {
    fn requires_account(&self) -> bool {
        !matches!(
            self,
            Commands::Signup { .. }
                | Commands::Login { .. }
                | Commands::LoginGoogle
                | Commands::LoginGithub
                | Commands::Logout
                | Commands::ConfigInit
                | Commands::Whoami
        )
    }
}

fn init_logging(cfg: &config::AppConfig) -> std::io::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    #[cfg(feature = "tokio-console")]
    {
        if cfg.debug_console {
            console_subscriber::init();
            return Ok(None);
        }
    }

    std::fs::create_dir_all(&cfg.data_dir)?;
    let file_appender = rolling::daily(&cfg.data_dir, "photo_browser.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cfg.log_level.clone()))
        .with_writer(std::io::stderr.and(file_writer))
        .init();
    Ok(Some(guard))
}

fn build_provider(cfg: &config::AppConfig) -> Result<LocalAuthProvider, auth::AuthError> {
    let mut provider = LocalAuthProvider::open(cfg.data_dir.join("auth.json"))?;
    if let Some(google) = OAuthProviderConfig::google_from_env(cfg.oauth_redirect_port) {
        provider = provider.with_google(OAuthPopup::new(google));
    }
    if let Some(github) = OAuthProviderConfig::github_from_env(cfg.oauth_redirect_port) {
        provider = provider.with_github(OAuthPopup::new(github));
    }
    Ok(provider)
}

#[cfg_attr(feature = "trace-spans", tracing::instrument(skip(cli)))]
async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let overrides = config::AppConfigOverrides {
        log_level: cli.log_level.clone(),
        api_base_url: cli.api_base_url.clone(),
        oauth_redirect_port: cli.oauth_redirect_port,
        data_dir: cli.data_dir.clone(),
        debug_console: cli.debug_console,
    };
    let cfg = config::AppConfig::load_from(cli.config.clone()).apply_overrides(&overrides);
    let _guard = init_logging(&cfg)?;

    if let Commands::ConfigInit = cli.command {
        let path = cfg.save_to(cli.config.clone())?;
        println!("Config written to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }
    tracing::debug!(api = %cfg.api_base_url, data_dir = %cfg.data_dir.display(), "starting");

    let provider: Arc<dyn AuthProvider> = Arc::new(build_provider(&cfg)?);
    let mut session = Session::start(provider);
    session.ready().await;

    let code = dispatch(&cli.command, &cfg, &session).await?;
    session.shutdown();
    Ok(code)
}

async fn dispatch(
    command: &Commands,
    cfg: &config::AppConfig,
    session: &Session,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if command.requires_account() {
        if let Err(e) = session.require_user() {
            println!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    }

    let signed_in = match command {
        Commands::Signup { email, password, confirm } => {
            Some(session.sign_up(email, password, confirm.as_deref()).await)
        }
        Commands::Login { email, password } => Some(session.sign_in(email, password).await),
        Commands::LoginGoogle => Some(session.sign_in_with_google().await),
        Commands::LoginGithub => Some(session.sign_in_with_github().await),
        _ => None,
    };
    if let Some(result) = signed_in {
        return Ok(match result {
            Ok(user) => {
                println!("Signed in as {}", user.label());
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("{}", render::error(&e.to_string()));
                ExitCode::FAILURE
            }
        });
    }

    let browser = Browser::new(ApiClient::with_base_url(cfg.api_base_url.clone()), cfg.page_sizes());
    let mut out = std::io::stdout().lock();
    let outcome = match command {
        Commands::Logout => {
            session.sign_out().await?;
            writeln!(out, "Signed out.")?;
            Outcome::Rendered
        }
        Commands::Whoami => {
            match session.state().user {
                Some(user) => writeln!(out, "Signed in as {} ({})", user.label(), user.provider)?,
                None => writeln!(out, "Not signed in.")?,
            }
            Outcome::Rendered
        }
        Commands::Home { page } => browser.home(&mut out, *page).await?,
        Commands::Users { page } => browser.users(&mut out, *page).await?,
        Commands::User { id, page } => browser.user(&mut out, *id, *page).await?,
        Commands::Albums { page } => browser.albums(&mut out, *page).await?,
        Commands::Album { id, page } => browser.album(&mut out, *id, *page).await?,
        Commands::Photos { page } => browser.photos(&mut out, *page).await?,
        Commands::Photo { id } => browser.photo(&mut out, *id).await?,
        Commands::RenamePhoto { id, title } => browser.rename_photo(&mut out, *id, title).await?,
        Commands::Signup { .. }
        | Commands::Login { .. }
        | Commands::LoginGoogle
        | Commands::LoginGithub
        | Commands::ConfigInit => {
            Outcome::Rendered
        }
    };

    Ok(match outcome {
        Outcome::Rendered => ExitCode::SUCCESS,
        Outcome::Failed => ExitCode::FAILURE,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", render::error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}
