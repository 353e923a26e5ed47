use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::api::SearchBackend;
use crate::error::TransportError;
use crate::models::{Proposal, SearchRequest, SearchResponse};
use crate::search::timer::DebounceTimer;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// What the search view should currently show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchView {
    pub query: String,
    pub indexer: String,
    /// Spelling correction, only kept when it differs from the query sent
    pub corrected_query: Option<String>,
    pub proposals: Vec<Proposal>,
    pub error: Option<String>,
    /// Generation of the newest request issued, or of the last clear
    pub latest: u64,
    /// Generation of the last admitted result
    pub generation: u64,
}

impl SearchView {
    /// True until the newest request has been answered. Older requests still
    /// on the wire do not count: their answers can no longer be admitted.
    pub fn is_searching(&self) -> bool {
        self.latest > self.generation
    }
}

/// State shared with spawned request tasks.
struct Shared {
    view: watch::Sender<SearchView>,
    issued: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    fn next_generation(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Admit `result` unless a newer generation was already admitted or the
    /// controller is gone. Returns whether the view took the result.
    fn admit(
        &self,
        request: &SearchRequest,
        result: Result<SearchResponse, TransportError>,
    ) -> bool {
        let mut admitted = false;
        self.view.send_modify(|view| {
            if self.closed.load(Ordering::SeqCst) {
                tracing::debug!(generation = request.generation, "Dropping result after teardown");
                return;
            }
            if request.generation < view.generation {
                tracing::debug!(
                    generation = request.generation,
                    admitted = view.generation,
                    "Dropping stale search result"
                );
                return;
            }

            view.generation = request.generation;
            match result {
                Ok(response) => {
                    view.corrected_query = response
                        .corrected
                        .filter(|corrected| corrected != &request.query);
                    view.proposals = response.proposals;
                    view.error = None;
                }
                Err(e) => {
                    tracing::warn!(query = %request.query, "Search failed: {e}");
                    view.error = Some(format!("Error fetching proposals: {e}"));
                }
            }
            admitted = true;
        });
        admitted
    }
}

/// Turns keystrokes and indexer changes into a debounced, ordered sequence
/// of search requests and keeps only the newest answer.
///
/// Requests run on spawned tokio tasks, so every method must be called from
/// within a runtime.
pub struct SearchController {
    backend: Arc<dyn SearchBackend>,
    debounce: Duration,
    shared: Arc<Shared>,
    timer: DebounceTimer,
}

impl SearchController {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            debounce: DEFAULT_DEBOUNCE,
            shared: Arc::new(Shared {
                view: watch::Sender::new(SearchView::default()),
                issued: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
            timer: DebounceTimer::new(),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Receiver notified on every view change.
    pub fn subscribe(&self) -> watch::Receiver<SearchView> {
        self.shared.view.subscribe()
    }

    pub fn view(&self) -> SearchView {
        self.shared.view.borrow().clone()
    }

    pub fn is_searching(&self) -> bool {
        self.shared.view.borrow().is_searching()
    }

    /// Record new input text. Empty input clears the results at once;
    /// anything else (re)starts the debounce window.
    pub fn on_input(&mut self, query: impl Into<String>, indexer: impl Into<String>) {
        let query = query.into();
        let indexer = indexer.into();

        if query.is_empty() {
            self.timer.cancel();
            let shared = &self.shared;
            shared.view.send_modify(|view| {
                view.query.clear();
                view.indexer = indexer;
                // Advancing the generation makes every in-flight answer stale
                let generation = shared.next_generation();
                view.latest = generation;
                view.generation = generation;
                view.corrected_query = None;
                view.proposals.clear();
                view.error = None;
            });
            return;
        }

        self.shared.view.send_modify(|view| {
            view.query = query.clone();
            view.indexer = indexer.clone();
        });

        let backend = self.backend.clone();
        let shared = self.shared.clone();
        self.timer.schedule(self.debounce, async move {
            issue(backend, shared, query, indexer);
        });
    }

    /// Switch indexer. With a query present the search is re-run right away,
    /// skipping the debounce window.
    pub fn on_indexer_change(&mut self, indexer: impl Into<String>) {
        let indexer = indexer.into();
        self.shared
            .view
            .send_modify(|view| view.indexer = indexer.clone());

        let query = self.shared.view.borrow().query.clone();
        if query.is_empty() {
            return;
        }
        self.timer.cancel();
        issue(self.backend.clone(), self.shared.clone(), query, indexer);
    }

    /// Stop the controller: no pending request fires and answers still in
    /// flight are dropped when they arrive.
    pub fn shutdown(&mut self) {
        self.timer.cancel();
        self.shared.closed.store(true, Ordering::SeqCst);
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Send a search for `query` on `indexer` unless the input has moved on since
/// it was scheduled. The generation is taken under the view lock, so it is
/// ordered against a concurrent clear.
fn issue(backend: Arc<dyn SearchBackend>, shared: Arc<Shared>, query: String, indexer: String) {
    let mut generation = 0;
    let current = shared.view.send_if_modified(|view| {
        if shared.closed.load(Ordering::SeqCst) || view.query != query || view.indexer != indexer {
            return false;
        }
        generation = shared.next_generation();
        view.latest = generation;
        view.error = None;
        true
    });
    if !current {
        tracing::debug!(query = %query, "Skipping search for superseded input");
        return;
    }

    let request = SearchRequest {
        query,
        indexer,
        generation,
    };
    tracing::debug!(
        query = %request.query,
        indexer = %request.indexer,
        generation = request.generation,
        "Issuing search"
    );

    tokio::spawn(async move {
        let result = backend.search(&request.query, &request.indexer).await;
        shared.admit(&request, result);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Shared {
        Shared {
            view: watch::Sender::new(SearchView::default()),
            issued: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    fn request(query: &str, generation: u64) -> SearchRequest {
        SearchRequest {
            query: query.into(),
            indexer: "bert".into(),
            generation,
        }
    }

    fn response(document: &str, corrected: Option<&str>) -> SearchResponse {
        SearchResponse {
            corrected: corrected.map(str::to_string),
            proposals: vec![Proposal {
                document: document.into(),
                score: 1.0,
            }],
        }
    }

    #[test]
    fn test_older_generation_is_dropped() {
        let shared = shared();
        assert!(shared.admit(&request("fast", 5), Ok(response("five", None))));
        assert!(!shared.admit(&request("slow", 3), Ok(response("three", None))));

        let view = shared.view.borrow();
        assert_eq!(view.generation, 5);
        assert_eq!(view.proposals[0].document, "five");
    }

    #[test]
    fn test_equal_or_newer_generation_is_admitted() {
        let shared = shared();
        assert!(shared.admit(&request("a", 2), Ok(response("a", None))));
        assert!(shared.admit(&request("a", 2), Ok(response("again", None))));
        assert!(shared.admit(&request("ab", 4), Ok(response("ab", None))));
        assert_eq!(shared.view.borrow().proposals[0].document, "ab");
    }

    #[test]
    fn test_correction_equal_to_query_is_hidden() {
        let shared = shared();
        shared.admit(&request("lenght", 1), Ok(response("len", Some("length"))));
        assert_eq!(shared.view.borrow().corrected_query.as_deref(), Some("length"));

        shared.admit(&request("length", 2), Ok(response("len", Some("length"))));
        assert!(shared.view.borrow().corrected_query.is_none());
    }

    #[test]
    fn test_error_keeps_previous_proposals() {
        let shared = shared();
        shared.admit(&request("a", 1), Ok(response("a", None)));
        shared.admit(
            &request("ab", 2),
            Err(TransportError::Status {
                status: 500,
                body: "oops".into(),
            }),
        );
        let view = shared.view.borrow();
        assert_eq!(view.proposals[0].document, "a");
        assert_eq!(
            view.error.as_deref(),
            Some("Error fetching proposals: backend returned 500: oops")
        );
    }

    #[test]
    fn test_closed_controller_admits_nothing() {
        let shared = shared();
        shared.closed.store(true, Ordering::SeqCst);
        assert!(!shared.admit(&request("a", 1), Ok(response("a", None))));
        assert!(shared.view.borrow().proposals.is_empty());
    }

    struct EmptyBackend;

    #[async_trait::async_trait]
    impl SearchBackend for EmptyBackend {
        async fn search(&self, _query: &str, _indexer: &str) -> Result<SearchResponse, TransportError> {
            Ok(SearchResponse::default())
        }
    }

    fn set_input(shared: &Shared, query: &str) {
        shared.view.send_modify(|view| {
            view.query = query.into();
            view.indexer = "bert".into();
        });
    }

    #[tokio::test]
    async fn test_issue_skips_superseded_input() {
        let shared = Arc::new(shared());
        set_input(&shared, "");
        issue(Arc::new(EmptyBackend), shared.clone(), "a".into(), "bert".into());

        assert_eq!(shared.issued.load(Ordering::SeqCst), 0);
        assert!(!shared.view.borrow().is_searching());
    }

    #[tokio::test]
    async fn test_issue_clears_previous_error() {
        let shared = Arc::new(shared());
        shared.admit(
            &request("a", 1),
            Err(TransportError::Disconnected("reset".into())),
        );
        assert!(shared.view.borrow().error.is_some());

        set_input(&shared, "ab");
        issue(Arc::new(EmptyBackend), shared.clone(), "ab".into(), "bert".into());
        let view = shared.view.borrow();
        assert!(view.error.is_none());
        assert!(view.is_searching());
    }

    #[test]
    fn test_only_newest_request_counts_as_searching() {
        let shared = shared();
        shared.view.send_modify(|view| view.latest = 2);
        assert!(shared.view.borrow().is_searching());

        // An answer older than the newest request leaves the indicator on
        shared.admit(&request("a", 1), Ok(response("a", None)));
        assert!(shared.view.borrow().is_searching());

        shared.admit(&request("ab", 2), Ok(response("ab", None)));
        assert!(!shared.view.borrow().is_searching());
    }

    #[test]
    fn test_generations_are_monotonic() {
        let shared = shared();
        assert_eq!(shared.next_generation(), 1);
        assert_eq!(shared.next_generation(), 2);
        assert_eq!(shared.next_generation(), 3);
    }
}
