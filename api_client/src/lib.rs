//! API client for the JSONPlaceholder users/albums/photos service.

use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub company: Option<Company>,
    pub address: Option<Address>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub name: String,
    pub catch_phrase: Option<String>,
    pub bs: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub suite: String,
    pub city: String,
    pub zipcode: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: u64,
    pub user_id: u64,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: u64,
    pub album_id: u64,
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
}

#[derive(Debug, Serialize)]
struct TitlePatch<'a> {
    title: &'a str,
}

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Request Error: {0}")]
    RequestError(String),
    #[error("Failed to fetch {resource}")]
    FetchFailed { resource: &'static str, status: u16 },
    #[error("Failed to update photo")]
    UpdateFailed { status: u16 },
    #[error("Decode Error: {0}")]
    DecodeError(String),
    #[error("Title cannot be empty")]
    EmptyTitle,
}

impl ApiClientError {
    /// HTTP status of the failed response, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiClientError::FetchFailed { status, .. } | ApiClientError::UpdateFailed { status } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a new client with a custom API base URL. Mainly used for testing.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        ApiClient {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<(&str, u64)>,
        resource: &'static str,
    ) -> Result<T, ApiClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url);
        if let Some((key, value)) = query {
            request = request.query(&[(key, value)]);
        }
        tracing::debug!(%url, ?query, "GET {}", resource);

        let response = request
            .send()
            .await
            .map_err(|e| ApiClientError::RequestError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::warn!(%url, status, "failed to fetch {}", resource);
            return Err(ApiClientError::FetchFailed { resource, status });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiClientError::DecodeError(e.to_string()))
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn fetch_users(&self) -> Result<Vec<User>, ApiClientError> {
        self.get_json("/users", None, "users").await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn fetch_user(&self, id: u64) -> Result<User, ApiClientError> {
        self.get_json(&format!("/users/{}", id), None, "user").await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn fetch_albums(&self) -> Result<Vec<Album>, ApiClientError> {
        self.get_json("/albums", None, "albums").await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn fetch_albums_by_user(&self, user_id: u64) -> Result<Vec<Album>, ApiClientError> {
        self.get_json("/albums", Some(("userId", user_id)), "albums")
            .await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn fetch_album(&self, id: u64) -> Result<Album, ApiClientError> {
        self.get_json(&format!("/albums/{}", id), None, "album").await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn fetch_photos(&self) -> Result<Vec<Photo>, ApiClientError> {
        self.get_json("/photos", None, "photos").await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn fetch_photos_by_album(&self, album_id: u64) -> Result<Vec<Photo>, ApiClientError> {
        self.get_json("/photos", Some(("albumId", album_id)), "photos")
            .await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn fetch_photo(&self, id: u64) -> Result<Photo, ApiClientError> {
        self.get_json(&format!("/photos/{}", id), None, "photo").await
    }

    /// Change a photo's title. The title is trimmed and must not be empty;
    /// an empty title is rejected before any request is sent.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn update_photo_title(&self, id: u64, title: &str) -> Result<Photo, ApiClientError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiClientError::EmptyTitle);
        }

        let url = format!("{}/photos/{}", self.base_url, id);
        tracing::info!(%url, title, "updating photo title");

        let response = self
            .client
            .patch(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&TitlePatch { title })
            .send()
            .await
            .map_err(|e| ApiClientError::RequestError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::warn!(%url, status, "failed to update photo");
            return Err(ApiClientError::UpdateFailed { status });
        }

        response
            .json::<Photo>()
            .await
            .map_err(|e| ApiClientError::DecodeError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_with_nested_company() {
        let json = r#"{
            "id": 1,
            "name": "Leanne Graham",
            "username": "Bret",
            "email": "Sincere@april.biz",
            "address": {
                "street": "Kulas Light",
                "suite": "Apt. 556",
                "city": "Gwenborough",
                "zipcode": "92998-3874",
                "geo": { "lat": "-37.3159", "lng": "81.1496" }
            },
            "phone": "1-770-736-8031 x56442",
            "website": "hildegard.org",
            "company": {
                "name": "Romaguera-Crona",
                "catchPhrase": "Multi-layered client-server neural-net",
                "bs": "harness real-time e-markets"
            }
        }"#;

        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.username, "Bret");
        assert_eq!(user.company.unwrap().name, "Romaguera-Crona");
        assert_eq!(user.address.unwrap().city, "Gwenborough");
    }

    #[test]
    fn test_parse_minimal_user() {
        let json = r#"{"id": 3, "name": "Clementine", "email": "c@example.com"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert!(user.company.is_none());
        assert_eq!(user.username, "");
    }

    #[test]
    fn test_parse_photo() {
        let json = r#"{
            "albumId": 1,
            "id": 2,
            "title": "reprehenderit est deserunt velit ipsam",
            "url": "https://via.placeholder.com/600/771796",
            "thumbnailUrl": "https://via.placeholder.com/150/771796"
        }"#;
        let photo: Photo = serde_json::from_str(json).unwrap();
        assert_eq!(photo.album_id, 1);
        assert_eq!(photo.thumbnail_url, "https://via.placeholder.com/150/771796");
    }

    #[test]
    fn test_error_messages() {
        let err = ApiClientError::FetchFailed { resource: "albums", status: 404 };
        assert_eq!(err.to_string(), "Failed to fetch albums");
        assert_eq!(err.status(), Some(404));
        assert_eq!(ApiClientError::EmptyTitle.to_string(), "Title cannot be empty");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::with_base_url("http://localhost:1234/");
        assert_eq!(client.base_url(), "http://localhost:1234");
    }

    #[tokio::test]
    async fn test_patch_request_format() {
        use mockito::{Matcher, Server};

        let mut server = Server::new_async().await;
        let _m = server
            .mock("PATCH", "/photos/5")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({ "title": "Sunset" })))
            .with_status(200)
            .with_body(
                r#"{"id":5,"albumId":1,"title":"Sunset","url":"u","thumbnailUrl":"t"}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::with_base_url(server.url());
        let photo = client.update_photo_title(5, "  Sunset ").await.unwrap();
        assert_eq!(photo.title, "Sunset");
    }

    #[tokio::test]
    async fn test_empty_title_rejected_before_request() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("PATCH", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = ApiClient::with_base_url(server.url());
        let err = client.update_photo_title(5, "   ").await.unwrap_err();
        assert!(matches!(err, ApiClientError::EmptyTitle));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_patch_failure_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("PATCH", "/photos/9")
            .with_status(500)
            .create_async()
            .await;

        let client = ApiClient::with_base_url(server.url());
        let err = client.update_photo_title(9, "x").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to update photo");
        assert_eq!(err.status(), Some(500));
    }
}
