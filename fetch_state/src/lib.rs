//! Tri-state tracking of asynchronous fetches.
//!
//! A [`FetchState`] runs a producer whenever it is handed a new key and
//! publishes `Pending`, then `Success` or `Failure`, through a
//! [`tokio::sync::watch`] channel. Results of requests that were superseded
//! by a newer key, or that settle after the controller was dropped, are
//! discarded. Producers are never cancelled; only their reporting is.

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Message reported when a producer fails with an empty description.
pub const FALLBACK_ERROR_MESSAGE: &str = "Error fetching data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Pending,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult<T> {
    Pending,
    Success(T),
    Failure(String),
}

impl<T> Default for FetchResult<T> {
    fn default() -> Self {
        FetchResult::Pending
    }
}

impl<T> FetchResult<T> {
    pub fn status(&self) -> FetchStatus {
        match self {
            FetchResult::Pending => FetchStatus::Pending,
            FetchResult::Success(_) => FetchStatus::Success,
            FetchResult::Failure(_) => FetchStatus::Failure,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FetchResult::Pending)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            FetchResult::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            FetchResult::Failure(message) => Some(message),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchResult<U> {
        match self {
            FetchResult::Pending => FetchResult::Pending,
            FetchResult::Success(data) => FetchResult::Success(f(data)),
            FetchResult::Failure(message) => FetchResult::Failure(message),
        }
    }

    /// Build a settled result from a producer outcome.
    pub fn from_outcome<E: fmt::Display>(outcome: Result<T, E>) -> Self {
        match outcome {
            Ok(data) => FetchResult::Success(data),
            Err(err) => {
                let message = err.to_string();
                if message.trim().is_empty() {
                    FetchResult::Failure(FALLBACK_ERROR_MESSAGE.to_string())
                } else {
                    FetchResult::Failure(message)
                }
            }
        }
    }
}

type Producer<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, String>> + Send + Sync>;

/// Runs producers keyed by an explicit identity and reports their outcome.
///
/// Loading the same key twice is a no-op; loading a different key supersedes
/// whatever is in flight. Must be driven from within a tokio runtime.
pub struct FetchState<K, T> {
    key: Option<K>,
    producer: Option<Producer<T>>,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<FetchResult<T>>>,
}

impl<K, T> Default for FetchState<K, T>
where
    K: PartialEq + Clone + fmt::Debug,
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> FetchState<K, T>
where
    K: PartialEq + Clone + fmt::Debug,
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (state, _) = watch::channel(FetchResult::Pending);
        FetchState {
            key: None,
            producer: None,
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
        }
    }

    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    /// Observe every state transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<FetchResult<T>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> FetchResult<T>
    where
        T: Clone,
    {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> FetchStatus {
        self.state.borrow().status()
    }

    /// Start fetching for `key` unless it is already the current key.
    ///
    /// Returns `true` when a new request was issued.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, producer)))]
    pub fn load<F, Fut, E>(&mut self, key: K, producer: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display + 'static,
    {
        if self.key.as_ref() == Some(&key) {
            tracing::trace!(?key, "fetch key unchanged; keeping current request");
            return false;
        }

        let producer: Producer<T> = Arc::new(move || {
            let fut = producer();
            async move {
                fut.await.map_err(|e| {
                    let message = e.to_string();
                    if message.trim().is_empty() {
                        FALLBACK_ERROR_MESSAGE.to_string()
                    } else {
                        message
                    }
                })
            }
            .boxed()
        });

        tracing::debug!(?key, "loading");
        self.key = Some(key);
        self.producer = Some(Arc::clone(&producer));
        self.issue(producer);
        true
    }

    /// Run the current producer again under a fresh request.
    ///
    /// Returns `false` when nothing has been loaded yet.
    pub fn reload(&mut self) -> bool {
        match self.producer.clone() {
            Some(producer) => {
                tracing::debug!(key = ?self.key, "reloading");
                self.issue(producer);
                true
            }
            None => false,
        }
    }

    /// Forget the current key and drop any in-flight result.
    pub fn reset(&mut self) {
        self.key = None;
        self.producer = None;
        let generation = Arc::clone(&self.generation);
        self.state.send_modify(|state| {
            generation.fetch_add(1, Ordering::SeqCst);
            *state = FetchResult::Pending;
        });
    }

    /// Wait until the current request settles and return its outcome.
    ///
    /// Returns `Pending` right away when nothing has been loaded.
    pub async fn settled(&self) -> FetchResult<T>
    where
        T: Clone,
    {
        if self.producer.is_none() {
            return FetchResult::Pending;
        }
        let mut rx = self.state.subscribe();
        let result = match rx.wait_for(|state| !state.is_pending()).await {
            Ok(state) => state.clone(),
            Err(_) => FetchResult::Pending,
        };
        result
    }

    fn issue(&self, producer: Producer<T>) {
        let generation = Arc::clone(&self.generation);
        let mut issued = 0;
        // Bumping the generation and resetting to Pending happen under the
        // channel lock so a settling request can never interleave with them.
        self.state.send_modify(|state| {
            issued = generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = FetchResult::Pending;
        });

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let outcome = producer().await;
            let applied = state.send_if_modified(move |current| {
                if generation.load(Ordering::SeqCst) != issued {
                    return false;
                }
                *current = match outcome {
                    Ok(data) => FetchResult::Success(data),
                    Err(message) => FetchResult::Failure(message),
                };
                true
            });
            if applied {
                tracing::debug!(generation = issued, "fetch settled");
            } else {
                tracing::debug!(generation = issued, "discarding superseded fetch result");
            }
        });
    }
}

impl<K, T> Drop for FetchState<K, T> {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    type Gate = oneshot::Receiver<Result<String, String>>;

    /// A producer that settles only when the paired sender fires.
    fn gated(
        rx: Gate,
    ) -> impl Fn() -> BoxFuture<'static, Result<String, String>> + Send + Sync + 'static {
        let slot = Arc::new(Mutex::new(Some(rx)));
        move || {
            let rx = slot.lock().unwrap().take();
            async move {
                match rx {
                    Some(rx) => rx.await.unwrap_or_else(|_| Err("gate dropped".into())),
                    None => Err("producer reused".into()),
                }
            }
            .boxed()
        }
    }

    async fn drain() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_success_reports_data() {
        let mut state: FetchState<u64, Vec<u32>> = FetchState::new();
        assert!(state.load(1, || async { Ok::<_, String>(vec![1, 2, 3]) }));
        assert_eq!(state.status(), FetchStatus::Pending);

        let result = state.settled().await;
        assert_eq!(result, FetchResult::Success(vec![1, 2, 3]));
        assert!(result.error_message().is_none());
    }

    #[tokio::test]
    async fn test_failure_reports_message_without_data() {
        let mut state: FetchState<u64, String> = FetchState::new();
        state.load(1, || async { Err::<String, _>("Failed to fetch photos") });

        let result = state.settled().await;
        assert_eq!(result.status(), FetchStatus::Failure);
        assert_eq!(result.error_message(), Some("Failed to fetch photos"));
        assert!(result.data().is_none());
    }

    #[tokio::test]
    async fn test_failure_without_message_uses_fallback() {
        let mut state: FetchState<u64, String> = FetchState::new();
        state.load(1, || async { Err::<String, _>("") });

        let result = state.settled().await;
        assert_eq!(result.error_message(), Some(FALLBACK_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn test_same_key_does_not_refetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut state: FetchState<&'static str, usize> = FetchState::new();

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            state.load("users", move || {
                let calls = Arc::clone(&calls);
                async move { Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst) + 1) }
            });
        }

        assert_eq!(state.settled().await, FetchResult::Success(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_superseded_result_never_overwrites_newer_one() {
        let (tx7, rx7) = oneshot::channel();
        let (tx8, rx8) = oneshot::channel();
        let mut state: FetchState<u64, String> = FetchState::new();

        state.load(7, gated(rx7));
        state.load(8, gated(rx8));

        tx8.send(Ok("album 8".into())).unwrap();
        assert_eq!(state.settled().await, FetchResult::Success("album 8".into()));

        tx7.send(Ok("album 7".into())).unwrap();
        drain().await;
        assert_eq!(state.snapshot(), FetchResult::Success("album 8".into()));
    }

    #[tokio::test]
    async fn test_stale_result_arriving_first_is_ignored() {
        let (tx7, rx7) = oneshot::channel();
        let (tx8, rx8) = oneshot::channel();
        let mut state: FetchState<u64, String> = FetchState::new();

        state.load(7, gated(rx7));
        state.load(8, gated(rx8));

        tx7.send(Err("Failed to fetch album".into())).unwrap();
        drain().await;
        assert!(state.snapshot().is_pending());

        tx8.send(Ok("album 8".into())).unwrap();
        assert_eq!(state.settled().await, FetchResult::Success("album 8".into()));
    }

    #[tokio::test]
    async fn test_subscriber_sees_pending_then_outcome() {
        let (tx, rx) = oneshot::channel();
        let mut state: FetchState<u64, String> = FetchState::new();
        let mut updates = state.subscribe();

        state.load(1, gated(rx));
        updates.changed().await.unwrap();
        assert!(updates.borrow_and_update().is_pending());

        tx.send(Ok("done".into())).unwrap();
        updates.changed().await.unwrap();
        assert_eq!(*updates.borrow(), FetchResult::Success("done".to_string()));
    }

    #[tokio::test]
    async fn test_drop_suppresses_in_flight_result() {
        let (tx, rx) = oneshot::channel();
        let mut state: FetchState<u64, String> = FetchState::new();
        let updates = state.subscribe();

        state.load(1, gated(rx));
        drop(state);

        tx.send(Ok("late".into())).unwrap();
        drain().await;
        assert!(updates.borrow().is_pending());
    }

    #[tokio::test]
    async fn test_reload_reruns_current_producer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut state: FetchState<u64, usize> = FetchState::new();
        assert!(!state.reload());

        let counter = Arc::clone(&calls);
        state.load(3, move || {
            let counter = Arc::clone(&counter);
            async move { Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst) + 1) }
        });
        assert_eq!(state.settled().await, FetchResult::Success(1));

        assert!(state.reload());
        assert!(state.snapshot().is_pending());
        assert_eq!(state.settled().await, FetchResult::Success(2));
        assert_eq!(state.key(), Some(&3));
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_and_allows_same_key() {
        let (tx, rx) = oneshot::channel();
        let mut state: FetchState<u64, String> = FetchState::new();
        state.load(1, gated(rx));
        state.reset();
        assert!(state.key().is_none());

        tx.send(Ok("stale".into())).unwrap();
        drain().await;
        assert!(state.snapshot().is_pending());
        assert_eq!(state.settled().await, FetchResult::Pending);

        assert!(state.load(1, || async { Ok::<_, String>("fresh".to_string()) }));
        assert_eq!(state.settled().await, FetchResult::Success("fresh".into()));
    }

    #[test]
    fn test_result_accessors() {
        let ok: FetchResult<u8> = FetchResult::from_outcome(Ok::<_, String>(4));
        assert_eq!(ok.data(), Some(&4));
        assert_eq!(ok.clone().map(|n| n * 2), FetchResult::Success(8));

        let err: FetchResult<u8> = FetchResult::from_outcome(Err("  "));
        assert_eq!(err.error_message(), Some(FALLBACK_ERROR_MESSAGE));
        assert_eq!(FetchResult::<u8>::default().status(), FetchStatus::Pending);
    }
}
