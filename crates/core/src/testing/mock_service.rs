//! Scripted `WebService` for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::fdsn::{FetchError, WebRequest, WebResponse, WebService};

type Scripted = (String, Result<WebResponse, FetchError>);

/// Mock web service with scripted responses keyed by URL substring.
///
/// Responses are consumed in enqueue order: each incoming request takes the
/// first still-queued entry whose key is a substring of the request URL.
/// Requests with no matching entry fail, so tests notice unexpected traffic.
#[derive(Default)]
pub struct MockWebService {
    queue: Mutex<Vec<Scripted>>,
    requests: Mutex<Vec<WebRequest>>,
}

impl MockWebService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next request whose URL contains `url_part`.
    pub fn enqueue(&self, url_part: &str, status: u16, body: Vec<u8>) {
        self.queue
            .lock()
            .unwrap()
            .push((url_part.to_string(), Ok(WebResponse { status, body })));
    }

    /// Queue a transport failure for the next matching request.
    pub fn enqueue_failure(&self, url_part: &str, error: FetchError) {
        self.queue
            .lock()
            .unwrap()
            .push((url_part.to_string(), Err(error)));
    }

    /// Every request seen so far, in arrival order.
    pub fn recorded_requests(&self) -> Vec<WebRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// URLs of every request seen so far.
    pub fn recorded_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

#[async_trait]
impl WebService for MockWebService {
    async fn fetch(&self, request: &WebRequest) -> Result<WebResponse, FetchError> {
        self.requests.lock().unwrap().push(request.clone());

        let mut queue = self.queue.lock().unwrap();
        let position = queue.iter().position(|(part, _)| request.url.contains(part));
        match position {
            Some(i) => queue.remove(i).1,
            None => Err(FetchError::RequestFailed(format!(
                "no scripted response for {}",
                request.url
            ))),
        }
    }
}
