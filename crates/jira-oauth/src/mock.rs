//! Mock transport for testing.
//!
//! Provides [`MockTransport`] for exercising the handshake and signed
//! requests without network access.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::client::{HttpRequest, HttpResponse, Transport};
use crate::error::TransportError;

/// Mock transport for testing.
///
/// Records every request it receives and answers with queued responses in
/// order. Once the queue is empty every request gets a 404.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use jira_oauth::MockTransport;
///
/// let transport = Arc::new(
///     MockTransport::new().with_response(200, "oauth_token=abc&oauth_token_secret=s"),
/// );
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Create a mock with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_response(self, status: u16, body: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            body: body.into(),
        }));
        self
    }

    /// Queue a transport failure.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_error(self, error: TransportError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Requests received so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(HttpResponse {
                    status: 404,
                    body: "no mock response queued".to_owned(),
                })
            })
    }
}
