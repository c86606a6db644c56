//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use notesync_protocol::{
    AcceptedChange, PullRequest, PullResponse, PushRequest, PushResponse, StatusResponse,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// A sync transport handles protocol communication with the sync server.
///
/// This trait is the named protocol boundary with no hidden state, so a
/// real HTTP client or an in-memory fake can be substituted without
/// touching the engine.
pub trait SyncTransport: Send + Sync {
    /// Uploads queued changes.
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;

    /// Downloads changes since a server sequence number.
    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse>;

    /// Probes server reachability independent of a sync cycle.
    fn check_status(&self) -> SyncResult<StatusResponse>;
}

/// A scripted transport for tests.
///
/// Pull responses are consumed as a queue of pages so pagination can be
/// exercised; an unset push response accepts every change with
/// server-assigned versions and sequences. Every request is recorded for
/// assertions.
#[derive(Default)]
pub struct MockTransport {
    push_responses: Mutex<VecDeque<PushResponse>>,
    pull_pages: Mutex<VecDeque<PullResponse>>,
    status_response: Mutex<Option<StatusResponse>>,
    push_error: Mutex<Option<String>>,
    pull_error: Mutex<Option<String>>,
    push_requests: Mutex<Vec<PushRequest>>,
    pull_requests: Mutex<Vec<PullRequest>>,
    next_sequence: AtomicU64,
}

impl MockTransport {
    /// Creates a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next push response; later calls queue further responses.
    pub fn enqueue_push_response(&self, response: PushResponse) {
        self.push_responses.lock().push_back(response);
    }

    /// Scripts the next pull page; later calls queue further pages.
    pub fn enqueue_pull_page(&self, page: PullResponse) {
        self.pull_pages.lock().push_back(page);
    }

    /// Scripts the status probe response.
    pub fn set_status_response(&self, response: StatusResponse) {
        *self.status_response.lock() = Some(response);
    }

    /// Makes every push fail with a retryable transport error.
    pub fn fail_pushes(&self, message: impl Into<String>) {
        *self.push_error.lock() = Some(message.into());
    }

    /// Makes every pull fail with a retryable transport error.
    pub fn fail_pulls(&self, message: impl Into<String>) {
        *self.pull_error.lock() = Some(message.into());
    }

    /// Restores normal push/pull behavior after scripted failures.
    pub fn heal(&self) {
        *self.push_error.lock() = None;
        *self.pull_error.lock() = None;
    }

    /// Push requests observed so far.
    pub fn push_requests(&self) -> Vec<PushRequest> {
        self.push_requests.lock().clone()
    }

    /// Pull requests observed so far.
    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.pull_requests.lock().clone()
    }

    /// Total number of network calls observed.
    pub fn request_count(&self) -> usize {
        self.push_requests.lock().len() + self.pull_requests.lock().len()
    }

    fn accept_all(&self, request: &PushRequest) -> PushResponse {
        let accepted = request
            .changes
            .iter()
            .map(|change| AcceptedChange {
                note_id: change.note_id.clone(),
                server_version: change.version + 1,
                server_sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1,
            })
            .collect();
        PushResponse::accepted(accepted)
    }
}

impl SyncTransport for MockTransport {
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.push_requests.lock().push(request.clone());
        if let Some(message) = self.push_error.lock().clone() {
            return Err(SyncError::transport_retryable(message));
        }
        let scripted = self.push_responses.lock().pop_front();
        Ok(scripted.unwrap_or_else(|| self.accept_all(request)))
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.pull_requests.lock().push(*request);
        if let Some(message) = self.pull_error.lock().clone() {
            return Err(SyncError::transport_retryable(message));
        }
        let scripted = self.pull_pages.lock().pop_front();
        Ok(scripted.unwrap_or_else(|| PullResponse::empty(request.since_sequence)))
    }

    fn check_status(&self) -> SyncResult<StatusResponse> {
        self.status_response
            .lock()
            .clone()
            .map_or_else(|| Ok(StatusResponse::healthy()), Ok)
    }
}
