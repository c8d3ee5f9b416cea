use api_client::{Album, ApiClient};
use fetch_state::{FetchResult, FetchState};
use std::time::Duration;
use tokio::time::{sleep, timeout};

fn album_producer(
    client: &ApiClient,
    id: u64,
) -> impl Fn() -> futures::future::BoxFuture<'static, Result<Album, api_client::ApiClientError>>
       + Send
       + Sync
       + 'static {
    use futures::FutureExt;
    let client = client.clone();
    move || {
        let client = client.clone();
        async move { client.fetch_album(id).await }.boxed()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_switching_albums_keeps_latest_result() {
    let server = httptest::Server::run();
    mocks::expect_slow_album(&server, 7, Duration::from_millis(400));
    mocks::expect_slow_album(&server, 8, Duration::from_millis(10));
    let client = ApiClient::with_base_url(server.url_str(""));

    let mut album: FetchState<u64, Album> = FetchState::new();
    album.load(7, album_producer(&client, 7));
    album.load(8, album_producer(&client, 8));

    let result = timeout(Duration::from_secs(5), album.settled()).await.unwrap();
    assert_eq!(result.data().map(|a| a.id), Some(8));

    // Let the slow request for album 7 complete; it must not be reported.
    sleep(Duration::from_millis(700)).await;
    assert_eq!(album.snapshot().data().map(|a| a.id), Some(8));
}

#[tokio::test]
async fn test_http_failure_surfaces_message() {
    let server = mocks::failing_server();
    let client = ApiClient::with_base_url(server.url_str(""));

    let mut album: FetchState<u64, Album> = FetchState::new();
    album.load(1, album_producer(&client, 1));

    match album.settled().await {
        FetchResult::Failure(message) => assert_eq!(message, "Failed to fetch album"),
        other => panic!("unexpected state: {:?}", other),
    }
}
