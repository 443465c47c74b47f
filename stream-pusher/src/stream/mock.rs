use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::StreamApiError;

use super::{DeleteOutcome, StreamApi, StreamState};

/// Calls received by [`MockStreamApi`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCall {
    Describe(String),
    Create(String, u32),
    Delete(String),
}

/// Scripted stream API for tests, always available so integration tests can use it.
///
/// `describe` answers come from a queue; once the queue is drained the last answer
/// is repeated. Clones share their script and call log.
#[derive(Clone)]
pub struct MockStreamApi {
    inner: Arc<Mutex<MockState>>,
}

struct MockState {
    describe: VecDeque<Result<StreamState, StreamApiError>>,
    last_describe: Result<StreamState, StreamApiError>,
    create: Result<(), StreamApiError>,
    delete: Result<DeleteOutcome, StreamApiError>,
    calls: Vec<StreamCall>,
}

impl Default for MockStreamApi {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                describe: VecDeque::new(),
                last_describe: Ok(StreamState::Absent),
                create: Ok(()),
                delete: Ok(DeleteOutcome::Deleted),
                calls: Vec::new(),
            })),
        }
    }
}

impl MockStreamApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answers of successive `describe` calls.
    pub fn describe_ret(
        self,
        responses: impl IntoIterator<Item = Result<StreamState, StreamApiError>>,
    ) -> Self {
        self.state().describe.extend(responses);
        self
    }

    /// Shorthand for a sequence of successful `describe` answers.
    pub fn states(self, states: impl IntoIterator<Item = StreamState>) -> Self {
        self.describe_ret(states.into_iter().map(Ok))
    }

    pub fn create_ret(self, response: Result<(), StreamApiError>) -> Self {
        self.state().create = response;
        self
    }

    pub fn delete_ret(self, response: Result<DeleteOutcome, StreamApiError>) -> Self {
        self.state().delete = response;
        self
    }

    pub fn calls(&self) -> Vec<StreamCall> {
        self.state().calls.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.count(|call| matches!(call, StreamCall::Create(..)))
    }

    pub fn delete_calls(&self) -> usize {
        self.count(|call| matches!(call, StreamCall::Delete(_)))
    }

    fn count(&self, predicate: impl Fn(&StreamCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StreamApi for MockStreamApi {
    async fn describe(&self, name: &str) -> Result<StreamState, StreamApiError> {
        let mut state = self.state();
        state.calls.push(StreamCall::Describe(name.to_owned()));
        if let Some(next) = state.describe.pop_front() {
            state.last_describe = next;
        }
        state.last_describe.clone()
    }

    async fn create(&self, name: &str, shard_count: u32) -> Result<(), StreamApiError> {
        let mut state = self.state();
        state
            .calls
            .push(StreamCall::Create(name.to_owned(), shard_count));
        state.create.clone()
    }

    async fn delete(&self, name: &str) -> Result<DeleteOutcome, StreamApiError> {
        let mut state = self.state();
        state.calls.push(StreamCall::Delete(name.to_owned()));
        state.delete.clone()
    }
}
