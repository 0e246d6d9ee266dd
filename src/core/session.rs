//! Lifecycle of an interactive image search and the guard that drops
//! results from superseded requests.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchState {
    Idle,
    Uploading,
    Previewed,
    Analyzing,
    ResultsShown,
    ErrorShown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchEvent {
    FileSelected,
    PreviewReady,
    AnalyzeRequested,
    AnalysisSucceeded,
    AnalysisFailed,
    Retry,
    Reset,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Cannot apply {event:?} while {from:?}")]
    InvalidTransition { from: SearchState, event: SearchEvent },
}

impl SearchState {
    pub fn apply(self, event: SearchEvent) -> Result<SearchState, SessionError> {
        use SearchEvent::*;
        use SearchState::*;

        let next = match (self, event) {
            (_, Reset) => Idle,
            (Idle | Previewed | ResultsShown | ErrorShown, FileSelected) => Uploading,
            (Uploading, PreviewReady) => Previewed,
            (Previewed, AnalyzeRequested) => Analyzing,
            (Analyzing, AnalysisSucceeded) => ResultsShown,
            (Analyzing, AnalysisFailed) => ErrorShown,
            (ResultsShown | ErrorShown, Retry) => Previewed,
            (from, event) => return Err(SessionError::InvalidTransition { from, event }),
        };
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchState::ResultsShown | SearchState::ErrorShown)
    }
}

/// Identifies one analyze request within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SearchTicket(u64);

impl SearchTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

/// One search panel. Every analyze request takes a ticket; only the newest
/// ticket may publish its outcome.
#[derive(Debug)]
pub struct SearchSession {
    latest: AtomicU64,
    state: Mutex<SearchState>,
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchSession {
    pub fn new() -> Self {
        Self {
            latest: AtomicU64::new(0),
            state: Mutex::new(SearchState::Idle),
        }
    }

    pub fn state(&self) -> SearchState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn apply(&self, event: SearchEvent) -> Result<SearchState, SessionError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = state.apply(event)?;
        Ok(*state)
    }

    /// Start analyzing. A search already in flight is superseded.
    pub fn begin(&self) -> Result<SearchTicket, SessionError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != SearchState::Analyzing {
            *state = state.apply(SearchEvent::AnalyzeRequested)?;
        }
        let sequence = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Search {} started", sequence);
        Ok(SearchTicket(sequence))
    }

    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Publish an outcome. Returns `None` and leaves the state alone when a
    /// newer search has started since `ticket` was issued, or the panel was
    /// reset meanwhile.
    pub fn complete<T, E>(
        &self,
        ticket: SearchTicket,
        outcome: Result<T, E>,
    ) -> Option<Result<T, E>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !self.is_current(ticket) || *state != SearchState::Analyzing {
            log::debug!("Discarding stale result of search {}", ticket.0);
            return None;
        }

        let event = if outcome.is_ok() {
            SearchEvent::AnalysisSucceeded
        } else {
            SearchEvent::AnalysisFailed
        };
        *state = state.apply(event).ok()?;
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ready_session() -> SearchSession {
        let session = SearchSession::new();
        session.apply(SearchEvent::FileSelected).unwrap();
        session.apply(SearchEvent::PreviewReady).unwrap();
        session
    }

    #[test]
    fn test_happy_path_and_retry() {
        let mut state = SearchState::Idle;
        for (event, expected) in [
            (SearchEvent::FileSelected, SearchState::Uploading),
            (SearchEvent::PreviewReady, SearchState::Previewed),
            (SearchEvent::AnalyzeRequested, SearchState::Analyzing),
            (SearchEvent::AnalysisFailed, SearchState::ErrorShown),
            (SearchEvent::Retry, SearchState::Previewed),
            (SearchEvent::AnalyzeRequested, SearchState::Analyzing),
            (SearchEvent::AnalysisSucceeded, SearchState::ResultsShown),
            (SearchEvent::Reset, SearchState::Idle),
        ] {
            state = state.apply(event).unwrap();
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn test_invalid_transitions() {
        assert_eq!(
            SearchState::Idle.apply(SearchEvent::AnalyzeRequested),
            Err(SessionError::InvalidTransition {
                from: SearchState::Idle,
                event: SearchEvent::AnalyzeRequested,
            })
        );
        assert!(SearchState::Uploading.apply(SearchEvent::Retry).is_err());
        assert!(SearchState::Analyzing.apply(SearchEvent::FileSelected).is_err());
        assert!(SearchState::ResultsShown.is_terminal());
    }

    #[test]
    fn test_stale_result_is_discarded() {
        let session = ready_session();
        let first = session.begin().unwrap();
        let second = session.begin().unwrap();
        assert!(second.sequence() > first.sequence());
        assert!(!session.is_current(first));

        let stale: Option<Result<&str, ()>> = session.complete(first, Ok("old"));
        assert!(stale.is_none());
        assert_eq!(session.state(), SearchState::Analyzing);

        let fresh = session.complete(second, Ok::<_, ()>("new"));
        assert_eq!(fresh, Some(Ok("new")));
        assert_eq!(session.state(), SearchState::ResultsShown);
    }

    #[test]
    fn test_failure_moves_to_error_state() {
        let session = ready_session();
        let ticket = session.begin().unwrap();
        let outcome = session.complete(ticket, Err::<(), _>("decode failed"));
        assert_eq!(outcome, Some(Err("decode failed")));
        assert_eq!(session.state(), SearchState::ErrorShown);
    }

    #[test]
    fn test_reset_drops_in_flight_result() {
        let session = ready_session();
        let ticket = session.begin().unwrap();
        session.apply(SearchEvent::Reset).unwrap();
        assert!(session.complete(ticket, Ok::<_, ()>(1)).is_none());
        assert_eq!(session.state(), SearchState::Idle);
    }

    #[test]
    fn test_begin_requires_preview() {
        let session = SearchSession::new();
        assert!(session.begin().is_err());
    }

    #[test]
    fn test_only_latest_of_concurrent_searches_publishes() {
        let session = Arc::new(ready_session());
        let tickets: Vec<SearchTicket> = (0..8).map(|_| session.begin().unwrap()).collect();

        let handles: Vec<_> = tickets
            .into_iter()
            .map(|ticket| {
                let session = Arc::clone(&session);
                thread::spawn(move || session.complete(ticket, Ok::<_, ()>(ticket.sequence())))
            })
            .collect();

        let published: Vec<u64> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(published, vec![8]);
    }
}
