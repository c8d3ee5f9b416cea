//! Browse pages.
//!
//! Every page drives its fetches through a [`FetchState`], writes the loading
//! line, then either the content or the error line.

use crate::config::PageSizes;
use crate::render;
use api_client::{Album, ApiClient, ApiClientError, Photo, User};
use fetch_state::{FetchResult, FetchState, FALLBACK_ERROR_MESSAGE};
use futures::future::join_all;
use pagination::{page_slice, total_pages, PaginationView};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Rendered,
    Failed,
}

/// Wait for `state` and report loading/error lines on `out`.
async fn settle<K, T, W>(out: &mut W, things: &str, state: &FetchState<K, T>) -> io::Result<Option<T>>
where
    K: PartialEq + Clone + fmt::Debug,
    T: Clone + Send + Sync + 'static,
    W: Write,
{
    writeln!(out, "{}", render::loading(things))?;
    match state.settled().await {
        FetchResult::Success(data) => Ok(Some(data)),
        FetchResult::Failure(message) => {
            writeln!(out, "{}", render::error(&message))?;
            Ok(None)
        }
        FetchResult::Pending => {
            writeln!(out, "{}", render::error(FALLBACK_ERROR_MESSAGE))?;
            Ok(None)
        }
    }
}

/// Clamp `requested` into the pages `total_items` needs.
fn clamp_page(requested: u32, total_items: usize, per_page: usize) -> u32 {
    requested.clamp(1, total_pages(total_items, per_page).max(1))
}

fn write_pager<W: Write>(out: &mut W, page: u32, total_items: usize, per_page: usize) -> io::Result<()> {
    if let Some(view) = PaginationView::compute(page, total_items, per_page) {
        writeln!(out, "{}", render::page_status(&view))?;
        writeln!(out, "{}", render::pagination(&view))?;
    }
    Ok(())
}

fn write_photo_line<W: Write>(out: &mut W, photo: &Photo) -> io::Result<()> {
    writeln!(out, "  #{} {} ({})", photo.id, photo.title, photo.thumbnail_url)
}

pub struct Browser {
    client: ApiClient,
    sizes: PageSizes,
}

impl Browser {
    pub fn new(client: ApiClient, sizes: PageSizes) -> Self {
        Browser { client, sizes }
    }

    fn users_state(&self) -> FetchState<(), Vec<User>> {
        let client = self.client.clone();
        let mut state = FetchState::new();
        state.load((), move || {
            let client = client.clone();
            async move { client.fetch_users().await }
        });
        state
    }

    fn user_state(&self, id: u64) -> FetchState<u64, User> {
        let client = self.client.clone();
        let mut state = FetchState::new();
        state.load(id, move || {
            let client = client.clone();
            async move { client.fetch_user(id).await }
        });
        state
    }

    fn album_state(&self, id: u64) -> FetchState<u64, Album> {
        let client = self.client.clone();
        let mut state = FetchState::new();
        state.load(id, move || {
            let client = client.clone();
            async move { client.fetch_album(id).await }
        });
        state
    }

    fn photo_state(&self, id: u64) -> FetchState<u64, Photo> {
        let client = self.client.clone();
        let mut state = FetchState::new();
        state.load(id, move || {
            let client = client.clone();
            async move { client.fetch_photo(id).await }
        });
        state
    }

    /// The landing page: every user with contact details.
    pub async fn home<W: Write>(&self, out: &mut W, page: u32) -> io::Result<Outcome> {
        writeln!(out, "Welcome")?;
        let users = self.users_state();
        let Some(users) = settle(out, "users", &users).await? else {
            return Ok(Outcome::Failed);
        };
        if users.is_empty() {
            writeln!(out, "{}", render::empty("users"))?;
            return Ok(Outcome::Rendered);
        }

        let per_page = self.sizes.home;
        let page = clamp_page(page, users.len(), per_page);
        for user in page_slice(&users, page, per_page) {
            writeln!(out, "  #{} {} (@{}) <{}>", user.id, user.name, user.username, user.email)?;
        }
        write_pager(out, page, users.len(), per_page)?;
        Ok(Outcome::Rendered)
    }

    /// Users with the number of albums each one owns.
    pub async fn users<W: Write>(&self, out: &mut W, page: u32) -> io::Result<Outcome> {
        writeln!(out, "Users")?;
        let users = self.users_state();
        let Some(users) = settle(out, "users", &users).await? else {
            return Ok(Outcome::Failed);
        };
        if users.is_empty() {
            writeln!(out, "{}", render::empty("users"))?;
            return Ok(Outcome::Rendered);
        }

        let per_page = self.sizes.users;
        let page = clamp_page(page, users.len(), per_page);
        let visible = page_slice(&users, page, per_page);
        let counts = join_all(visible.iter().map(|user| {
            let client = self.client.clone();
            let id = user.id;
            async move {
                match client.fetch_albums_by_user(id).await {
                    Ok(albums) => albums.len(),
                    Err(e) => {
                        tracing::warn!(user_id = id, error = %e, "failed to count albums");
                        0
                    }
                }
            }
        }))
        .await;

        for (user, count) in visible.iter().zip(counts) {
            let company = user.company.as_ref().map(|c| c.name.as_str()).unwrap_or("-");
            writeln!(out, "  #{} {} [{}] - {} albums", user.id, user.name, company, count)?;
        }
        write_pager(out, page, users.len(), per_page)?;
        Ok(Outcome::Rendered)
    }

    /// One user's profile and albums.
    pub async fn user<W: Write>(&self, out: &mut W, id: u64, page: u32) -> io::Result<Outcome> {
        // Both requests start before either is awaited.
        let user = self.user_state(id);
        let client = self.client.clone();
        let mut albums = FetchState::new();
        albums.load(id, move || {
            let client = client.clone();
            async move { client.fetch_albums_by_user(id).await }
        });

        let Some(user) = settle(out, "user", &user).await? else {
            return Ok(Outcome::Failed);
        };
        writeln!(out, "{} (@{})", user.name, user.username)?;
        writeln!(out, "  Email: {}", user.email)?;
        if let Some(phone) = &user.phone {
            writeln!(out, "  Phone: {}", phone)?;
        }
        if let Some(website) = &user.website {
            writeln!(out, "  Website: {}", website)?;
        }
        if let Some(company) = &user.company {
            writeln!(out, "  Company: {}", company.name)?;
        }

        let Some(albums) = settle(out, "albums", &albums).await? else {
            return Ok(Outcome::Failed);
        };
        if albums.is_empty() {
            writeln!(out, "No albums found for this user.")?;
            return Ok(Outcome::Rendered);
        }
        writeln!(out, "Albums")?;
        let per_page = self.sizes.user_albums;
        let page = clamp_page(page, albums.len(), per_page);
        for album in page_slice(&albums, page, per_page) {
            writeln!(out, "  #{} {}", album.id, album.title)?;
        }
        write_pager(out, page, albums.len(), per_page)?;
        Ok(Outcome::Rendered)
    }

    pub async fn albums<W: Write>(&self, out: &mut W, page: u32) -> io::Result<Outcome> {
        writeln!(out, "Albums")?;
        let client = self.client.clone();
        let mut albums = FetchState::new();
        albums.load((), move || {
            let client = client.clone();
            async move { client.fetch_albums().await }
        });
        let Some(albums) = settle(out, "albums", &albums).await? else {
            return Ok(Outcome::Failed);
        };
        if albums.is_empty() {
            writeln!(out, "{}", render::empty("albums"))?;
            return Ok(Outcome::Rendered);
        }

        let per_page = self.sizes.albums;
        let page = clamp_page(page, albums.len(), per_page);
        for album in page_slice(&albums, page, per_page) {
            writeln!(out, "  #{} {} (user {})", album.id, album.title, album.user_id)?;
        }
        write_pager(out, page, albums.len(), per_page)?;
        Ok(Outcome::Rendered)
    }

    /// An album's title and the photos it contains.
    pub async fn album<W: Write>(&self, out: &mut W, id: u64, page: u32) -> io::Result<Outcome> {
        let album = self.album_state(id);
        let client = self.client.clone();
        let mut photos = FetchState::new();
        photos.load(id, move || {
            let client = client.clone();
            async move { client.fetch_photos_by_album(id).await }
        });

        let Some(album) = settle(out, "album", &album).await? else {
            return Ok(Outcome::Failed);
        };
        writeln!(out, "{}", album.title)?;

        let Some(photos) = settle(out, "photos", &photos).await? else {
            return Ok(Outcome::Failed);
        };
        if photos.is_empty() {
            writeln!(out, "{}", render::empty("photos"))?;
            return Ok(Outcome::Rendered);
        }
        let per_page = self.sizes.album_photos;
        let page = clamp_page(page, photos.len(), per_page);
        for photo in page_slice(&photos, page, per_page) {
            write_photo_line(out, photo)?;
        }
        write_pager(out, page, photos.len(), per_page)?;
        Ok(Outcome::Rendered)
    }

    /// Every photo, each with the title of its album.
    pub async fn photos<W: Write>(&self, out: &mut W, page: u32) -> io::Result<Outcome> {
        writeln!(out, "Photos")?;
        let client = self.client.clone();
        let mut photos = FetchState::new();
        photos.load((), move || {
            let client = client.clone();
            async move { client.fetch_photos().await }
        });
        let Some(photos) = settle(out, "photos", &photos).await? else {
            return Ok(Outcome::Failed);
        };
        if photos.is_empty() {
            writeln!(out, "{}", render::empty("photos"))?;
            return Ok(Outcome::Rendered);
        }

        let per_page = self.sizes.photos;
        let page = clamp_page(page, photos.len(), per_page);
        let visible = page_slice(&photos, page, per_page);
        let titles = self.album_titles(visible).await;

        for photo in visible {
            match titles.get(&photo.album_id) {
                Some(title) => writeln!(out, "  #{} {} [{}]", photo.id, photo.title, title)?,
                None => writeln!(out, "  #{} {}", photo.id, photo.title)?,
            }
        }
        write_pager(out, page, photos.len(), per_page)?;
        Ok(Outcome::Rendered)
    }

    async fn album_titles(&self, photos: &[Photo]) -> HashMap<u64, String> {
        let mut ids: Vec<u64> = photos.iter().map(|p| p.album_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let fetched = join_all(ids.into_iter().map(|id| {
            let client = self.client.clone();
            async move { (id, client.fetch_album(id).await) }
        }))
        .await;

        fetched
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(album) => Some((id, album.title)),
                Err(e) => {
                    tracing::warn!(album_id = id, error = %e, "failed to fetch album title");
                    None
                }
            })
            .collect()
    }

    /// Photo details with a breadcrumb resolved through the photo's album and
    /// that album's owner.
    pub async fn photo<W: Write>(&self, out: &mut W, id: u64) -> io::Result<Outcome> {
        let photo = self.photo_state(id);
        let Some(photo) = settle(out, "photo", &photo).await? else {
            return Ok(Outcome::Failed);
        };
        self.write_photo(out, &photo).await?;
        Ok(Outcome::Rendered)
    }

    /// Save a new title, then show the photo as the server now reports it.
    pub async fn rename_photo<W: Write>(&self, out: &mut W, id: u64, title: &str) -> io::Result<Outcome> {
        if title.trim().is_empty() {
            writeln!(out, "{}", render::error(&ApiClientError::EmptyTitle.to_string()))?;
            return Ok(Outcome::Failed);
        }

        let mut photo = self.photo_state(id);
        if settle(out, "photo", &photo).await?.is_none() {
            return Ok(Outcome::Failed);
        }

        match self.client.update_photo_title(id, title).await {
            Ok(updated) => writeln!(out, "Title updated: {}", updated.title)?,
            Err(e) => {
                writeln!(out, "{}", render::error(&e.to_string()))?;
                return Ok(Outcome::Failed);
            }
        }

        photo.reload();
        let Some(photo) = settle(out, "photo", &photo).await? else {
            return Ok(Outcome::Failed);
        };
        self.write_photo(out, &photo).await?;
        Ok(Outcome::Rendered)
    }

    async fn write_photo<W: Write>(&self, out: &mut W, photo: &Photo) -> io::Result<()> {
        let (album, user) = self.breadcrumb(photo).await;
        let album_title = album.as_ref().map(|a| a.title.as_str()).unwrap_or("Album");
        let user_name = user.as_ref().map(|u| u.name.as_str()).unwrap_or("User");
        writeln!(out, "Home / Users / {} / {} / Photo {}", user_name, album_title, photo.id)?;
        writeln!(out, "{}", photo.title)?;
        writeln!(out, "  Image: {}", photo.url)?;
        writeln!(out, "  Thumbnail: {}", photo.thumbnail_url)?;
        Ok(())
    }

    /// Album then user; each step starts only once the previous one is known.
    async fn breadcrumb(&self, photo: &Photo) -> (Option<Album>, Option<User>) {
        let album = self.album_state(photo.album_id).settled().await.data().cloned();
        let user = match &album {
            Some(album) => self.user_state(album.user_id).settled().await.data().cloned(),
            None => None,
        };
        (album, user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::matchers::request;
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};

    fn browser(server: &Server) -> Browser {
        Browser::new(ApiClient::with_base_url(server.url_str("")), PageSizes::default())
    }

    fn text(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_home_first_page() {
        let server = mocks::placeholder_server();
        let browser = browser(&server);
        let mut out = Vec::new();
        let outcome = browser.home(&mut out, 1).await.unwrap();
        let text = text(out);

        assert_eq!(outcome, Outcome::Rendered);
        assert!(text.starts_with("Welcome\nLoading users...\n"));
        assert!(text.contains("#1 User 1 (@user1) <user1@example.com>"));
        assert!(text.contains("#10 User 10"));
        assert!(!text.contains("#11 User 11"));
        assert!(text.contains("(Previous) <1> 2 [Next]"));
    }

    #[tokio::test]
    async fn test_out_of_range_page_is_clamped() {
        let server = mocks::placeholder_server();
        let browser = browser(&server);
        let mut out = Vec::new();
        browser.home(&mut out, 99).await.unwrap();
        let text = text(out);

        assert!(text.contains("#12 User 12"));
        assert!(text.contains("Page 2 of 2"));
        assert!(text.contains("[Previous] 1 <2> (Next)"));
    }

    #[tokio::test]
    async fn test_users_with_album_counts() {
        let server = mocks::placeholder_server();
        let browser = browser(&server);
        let mut out = Vec::new();
        browser.users(&mut out, 1).await.unwrap();
        let text = text(out);

        assert!(text.contains("#1 User 1 [Company 1] - 2 albums"));
        assert!(text.contains("#9 User 9"));
        assert!(!text.contains("#10 User 10"));
    }

    #[tokio::test]
    async fn test_failed_album_count_shows_zero() {
        let server = Server::run();
        mocks::expect_users(&server);
        server.expect(
            Expectation::matching(request::method_path("GET", "/albums"))
                .times(..)
                .respond_with(status_code(500)),
        );
        let browser = browser(&server);
        let mut out = Vec::new();
        let outcome = browser.users(&mut out, 1).await.unwrap();
        let text = text(out);

        assert_eq!(outcome, Outcome::Rendered);
        assert!(text.contains("#1 User 1 [Company 1] - 0 albums"));
    }

    #[tokio::test]
    async fn test_failing_server_shows_error() {
        let server = mocks::failing_server();
        let browser = browser(&server);
        let mut out = Vec::new();
        let outcome = browser.users(&mut out, 1).await.unwrap();
        let text = text(out);

        assert_eq!(outcome, Outcome::Failed);
        assert!(text.contains("Loading users...\nError: Failed to fetch users"));
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/users"))
                .respond_with(json_encoded(Vec::<serde_json::Value>::new())),
        );
        let browser = browser(&server);
        let mut out = Vec::new();
        let outcome = browser.home(&mut out, 1).await.unwrap();
        let text = text(out);

        assert_eq!(outcome, Outcome::Rendered);
        assert!(text.contains("No users found."));
    }

    #[tokio::test]
    async fn test_user_profile_and_albums() {
        let server = mocks::placeholder_server();
        let browser = browser(&server);
        let mut out = Vec::new();
        browser.user(&mut out, 2, 1).await.unwrap();
        let text = text(out);

        assert!(text.contains("User 2 (@user2)"));
        assert!(text.contains("Company: Company 2"));
        assert!(text.contains("#3 album 3"));
        assert!(text.contains("#4 album 4"));
        assert!(!text.contains("#5 album 5"));
    }

    #[tokio::test]
    async fn test_album_lists_its_photos() {
        let server = mocks::placeholder_server();
        let browser = browser(&server);
        let mut out = Vec::new();
        browser.album(&mut out, 2, 1).await.unwrap();
        let text = text(out);

        assert!(text.contains("album 2\n"));
        assert!(text.contains("#4 photo 4"));
        assert!(text.contains("#6 photo 6"));
        assert!(!text.contains("#7 photo 7"));
    }

    #[tokio::test]
    async fn test_photos_page_names_albums() {
        let server = mocks::placeholder_server();
        let browser = browser(&server);
        let mut out = Vec::new();
        browser.photos(&mut out, 2).await.unwrap();
        let text = text(out);

        assert!(text.contains("#13 photo 13 [album 5]"));
        assert!(text.contains("Page 2 of 6"));
    }

    #[tokio::test]
    async fn test_photo_breadcrumb() {
        let server = mocks::placeholder_server();
        let browser = browser(&server);
        let mut out = Vec::new();
        browser.photo(&mut out, 4).await.unwrap();
        let text = text(out);

        assert!(text.contains("Home / Users / User 1 / album 2 / Photo 4"));
        assert!(text.contains("Image: https://via.placeholder.com/600/4"));
    }

    #[tokio::test]
    async fn test_breadcrumb_falls_back_when_album_is_missing() {
        let server = Server::run();
        mocks::expect_photos(&server);
        server.expect(
            Expectation::matching(request::method_path("GET", "/albums/2"))
                .respond_with(status_code(404)),
        );
        let browser = browser(&server);
        let mut out = Vec::new();
        let outcome = browser.photo(&mut out, 4).await.unwrap();
        let text = text(out);

        assert_eq!(outcome, Outcome::Rendered);
        assert!(text.contains("Home / Users / User / Album / Photo 4"));
    }

    #[tokio::test]
    async fn test_rename_photo_saves_and_reloads() {
        let server = mocks::placeholder_server();
        mocks::expect_title_patch(&server, 1, "sunset");
        let browser = browser(&server);
        let mut out = Vec::new();
        let outcome = browser.rename_photo(&mut out, 1, "  sunset ").await.unwrap();
        let text = text(out);

        assert_eq!(outcome, Outcome::Rendered);
        assert!(text.contains("Title updated: sunset"));
        assert_eq!(text.matches("Loading photo...").count(), 2);
    }

    #[tokio::test]
    async fn test_rename_photo_rejects_empty_title() {
        let server = mocks::placeholder_server();
        let browser = browser(&server);
        let mut out = Vec::new();
        let outcome = browser.rename_photo(&mut out, 1, "   ").await.unwrap();
        let text = text(out);

        assert_eq!(outcome, Outcome::Failed);
        assert!(text.contains("Error: Title cannot be empty"));
    }

    #[tokio::test]
    async fn test_empty_title_is_rejected_before_any_request() {
        let server = mocks::failing_server();
        let browser = browser(&server);
        let mut out = Vec::new();
        let outcome = browser.rename_photo(&mut out, 1, "   ").await.unwrap();
        let text = text(out);

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(text, "Error: Title cannot be empty\n");
    }

    #[tokio::test]
    async fn test_user_without_albums() {
        let server = Server::run();
        mocks::expect_users(&server);
        server.expect(
            Expectation::matching(request::method_path("GET", "/albums"))
                .respond_with(json_encoded(Vec::<serde_json::Value>::new())),
        );
        let browser = browser(&server);
        let mut out = Vec::new();
        let outcome = browser.user(&mut out, 3, 1).await.unwrap();
        let text = text(out);

        assert_eq!(outcome, Outcome::Rendered);
        assert!(text.contains("User 3 (@user3)"));
        assert!(text.contains("No albums found for this user."));
    }
}
