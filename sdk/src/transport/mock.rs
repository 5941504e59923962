//! Scripted in-memory [`RestClient`] for tests.
//!
//! Replies are queued per operation and handed out in order; every call is
//! recorded so tests can assert on what (and whether anything) went out.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use super::{RestClient, RestResponse, TransportError};
use crate::types::{Envelope, Query};

/// One request observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Query { url: Url, query: Query },
    Submit { url: Url, envelope: Envelope },
}

type Reply = Result<RestResponse, String>;

#[derive(Debug, Default)]
pub struct MockRestClient {
    query_replies: Mutex<VecDeque<Reply>>,
    submit_replies: Mutex<VecDeque<Reply>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockRestClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the reply for the next `query` call.
    pub fn push_query_reply(&self, response: RestResponse) {
        self.query_replies.lock().push_back(Ok(response));
    }

    /// Queues the reply for the next `submit` call.
    pub fn push_submit_reply(&self, response: RestResponse) {
        self.submit_replies.lock().push_back(Ok(response));
    }

    /// Makes the next `submit` call fail at the transport level.
    pub fn push_submit_failure(&self, message: impl Into<String>) {
        self.submit_replies.lock().push_back(Err(message.into()));
    }

    /// Makes the next `query` call fail at the transport level.
    pub fn push_query_failure(&self, message: impl Into<String>) {
        self.query_replies.lock().push_back(Err(message.into()));
    }

    /// Delays every reply, to exercise caller deadlines.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Envelopes received through `submit`, in order.
    pub fn submitted(&self) -> Vec<Envelope> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Submit { envelope, .. } => Some(envelope.clone()),
                RecordedCall::Query { .. } => None,
            })
            .collect()
    }

    async fn reply(&self, queue: &Mutex<VecDeque<Reply>>, op: &str) -> Result<RestResponse, TransportError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = queue.lock().pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(TransportError::Connection(message)),
            None => Err(TransportError::Connection(format!("no mock {} reply queued", op))),
        }
    }
}

#[async_trait]
impl RestClient for MockRestClient {
    async fn query(&self, url: &Url, query: &Query) -> Result<RestResponse, TransportError> {
        self.calls.lock().push(RecordedCall::Query {
            url: url.clone(),
            query: query.clone(),
        });
        self.reply(&self.query_replies, "query").await
    }

    async fn submit(&self, url: &Url, envelope: &Envelope) -> Result<RestResponse, TransportError> {
        self.calls.lock().push(RecordedCall::Submit {
            url: url.clone(),
            envelope: envelope.clone(),
        });
        self.reply(&self.submit_replies, "submit").await
    }
}
