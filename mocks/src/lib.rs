use httptest::{matchers::*, responders::*, Expectation, Server};
use serde_json::{json, Value};
use std::time::Duration;

/// Number of users served by [`placeholder_server`].
pub const USER_COUNT: u64 = 12;
/// Albums owned by each user.
pub const ALBUMS_PER_USER: u64 = 2;
/// Photos contained in each album.
pub const PHOTOS_PER_ALBUM: u64 = 3;

pub fn user_json(id: u64) -> Value {
    json!({
        "id": id,
        "name": format!("User {}", id),
        "username": format!("user{}", id),
        "email": format!("user{}@example.com", id),
        "phone": "1-770-736-8031",
        "website": "example.org",
        "company": {
            "name": format!("Company {}", id),
            "catchPhrase": "Multi-layered client-server neural-net",
            "bs": "harness real-time e-markets"
        }
    })
}

pub fn album_json(id: u64) -> Value {
    json!({
        "id": id,
        "userId": (id - 1) / ALBUMS_PER_USER + 1,
        "title": format!("album {}", id),
    })
}

pub fn photo_json(id: u64) -> Value {
    photo_json_titled(id, &format!("photo {}", id))
}

pub fn photo_json_titled(id: u64, title: &str) -> Value {
    json!({
        "id": id,
        "albumId": (id - 1) / PHOTOS_PER_ALBUM + 1,
        "title": title,
        "url": format!("https://via.placeholder.com/600/{}", id),
        "thumbnailUrl": format!("https://via.placeholder.com/150/{}", id),
    })
}

fn album_count() -> u64 {
    USER_COUNT * ALBUMS_PER_USER
}

fn photo_count() -> u64 {
    album_count() * PHOTOS_PER_ALBUM
}

/// Start a server that answers every collection and detail endpoint of the
/// placeholder API with deterministic fixtures.
pub fn placeholder_server() -> Server {
    let server = Server::run();
    expect_users(&server);
    expect_albums(&server);
    expect_photos(&server);
    server
}

/// Start a server that answers every request with a 500.
pub fn failing_server() -> Server {
    let server = Server::run();
    server.expect(
        Expectation::matching(any())
            .times(..)
            .respond_with(status_code(500)),
    );
    server
}

/// Expect `GET /users` and `GET /users/{id}` for every fixture user.
pub fn expect_users(server: &Server) {
    let users: Vec<Value> = (1..=USER_COUNT).map(user_json).collect();
    server.expect(
        Expectation::matching(request::method_path("GET", "/users"))
            .times(..)
            .respond_with(json_encoded(users)),
    );
    for id in 1..=USER_COUNT {
        server.expect(
            Expectation::matching(request::method_path("GET", format!("/users/{}", id)))
                .times(..)
                .respond_with(json_encoded(user_json(id))),
        );
    }
}

/// Expect the album list, the per-user filter and the album detail routes.
pub fn expect_albums(server: &Server) {
    let albums: Vec<Value> = (1..=album_count()).map(album_json).collect();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/albums"),
            not(request::query(url_decoded(contains(key("userId"))))),
        ])
        .times(..)
        .respond_with(json_encoded(albums)),
    );
    for user_id in 1..=USER_COUNT {
        let owned: Vec<Value> = (1..=album_count())
            .filter(|id| (id - 1) / ALBUMS_PER_USER + 1 == user_id)
            .map(album_json)
            .collect();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/albums"),
                request::query(url_decoded(contains(("userId", user_id.to_string())))),
            ])
            .times(..)
            .respond_with(json_encoded(owned)),
        );
    }
    for id in 1..=album_count() {
        server.expect(
            Expectation::matching(request::method_path("GET", format!("/albums/{}", id)))
                .times(..)
                .respond_with(json_encoded(album_json(id))),
        );
    }
}

/// Expect the photo list, the per-album filter and the photo detail routes.
pub fn expect_photos(server: &Server) {
    let photos: Vec<Value> = (1..=photo_count()).map(photo_json).collect();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/photos"),
            not(request::query(url_decoded(contains(key("albumId"))))),
        ])
        .times(..)
        .respond_with(json_encoded(photos)),
    );
    for album_id in 1..=album_count() {
        let contained: Vec<Value> = (1..=photo_count())
            .filter(|id| (id - 1) / PHOTOS_PER_ALBUM + 1 == album_id)
            .map(photo_json)
            .collect();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/photos"),
                request::query(url_decoded(contains(("albumId", album_id.to_string())))),
            ])
            .times(..)
            .respond_with(json_encoded(contained)),
        );
    }
    for id in 1..=photo_count() {
        server.expect(
            Expectation::matching(request::method_path("GET", format!("/photos/{}", id)))
                .times(..)
                .respond_with(json_encoded(photo_json(id))),
        );
    }
}

fn title_body(title: &str) -> impl Matcher<Value> {
    eq(json!({ "title": title }))
}

/// Expect a `PATCH /photos/{id}` carrying exactly `{"title": title}`.
pub fn expect_title_patch(server: &Server, id: u64, title: &str) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PATCH", format!("/photos/{}", id)),
            request::body(json_decoded(title_body(title))),
        ])
        .respond_with(json_encoded(photo_json_titled(id, title))),
    );
}

/// Expect a single `GET /albums/{id}` answered only after `delay`.
pub fn expect_slow_album(server: &Server, id: u64, delay: Duration) {
    server.expect(
        Expectation::matching(request::method_path("GET", format!("/albums/{}", id)))
            .respond_with(delay_and_then(delay, json_encoded(album_json(id)))),
    );
}

/// Create a mock server for the OAuth token endpoint.
/// The server will respond to POST `/token` with a fixed access token.
pub fn token_server(access_token: &str) -> Server {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/token"))
            .times(..)
            .respond_with(json_encoded(json!({
                "access_token": access_token,
                "token_type": "Bearer",
                "expires_in": 3600
            }))),
    );
    server
}

/// Expect a `GET /userinfo` authorized with `access_token`, answering with `profile`.
pub fn expect_userinfo(server: &Server, access_token: &str, profile: Value) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/userinfo"),
            request::headers(contains(("authorization", format!("Bearer {}", access_token)))),
        ])
        .times(..)
        .respond_with(json_encoded(profile)),
    );
}
