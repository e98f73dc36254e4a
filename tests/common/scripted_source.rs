//! A `Source` that plays back a script, one step per fetch.
//!
//! Records travel through the same fetch → decode split as a real backend:
//! `fetch` serialises the step's records to JSON bytes and `decode` parses
//! them back, so decode failures can be scripted with [`Step::Malformed`].
//! Once the script runs out every fetch returns an empty batch.

use async_trait::async_trait;
use bytes::Bytes;
use stail_core::{DecodeError, FetchError, Record, Source};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub enum Step {
    /// Return these records.
    Records(Vec<Record>),
    /// Fail the fetch.
    Fail(FetchError),
    /// Succeed the fetch with bytes `decode` rejects.
    Malformed,
    /// Never return until cancelled.
    Hang,
    /// Wait for the gate to open, then return these records.
    Gated(Arc<Notify>, Vec<Record>),
}

#[derive(Default)]
pub struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    fetches: AtomicUsize,
    query: Mutex<String>,
    /// Query text observed at the start of each fetch.
    fetch_queries: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        })
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fetch_queries(&self) -> Vec<String> {
        self.fetch_queries.lock().unwrap().clone()
    }

    /// Poll (in virtual time) until at least `n` fetches have started.
    pub async fn wait_for_fetches(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(60), async {
            while self.fetches() < n {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("fetch count never reached");
    }
}

fn encode(records: &[Record]) -> Bytes {
    Bytes::from(serde_json::to_vec(records).unwrap())
}

#[async_trait]
impl Source for ScriptedSource {
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Bytes, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch_queries.lock().unwrap().push(self.query());

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            None => Ok(encode(&[])),
            Some(Step::Records(records)) => Ok(encode(&records)),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Malformed) => Ok(Bytes::from_static(b"{not json")),
            Some(Step::Hang) => {
                cancel.cancelled().await;
                Err(FetchError::Cancelled)
            }
            Some(Step::Gated(gate, records)) => {
                gate.notified().await;
                Ok(encode(&records))
            }
        }
    }

    fn decode(&self, raw: &[u8]) -> Result<Vec<Record>, DecodeError> {
        Ok(serde_json::from_slice(raw)?)
    }

    fn set_query(&self, text: &str) {
        *self.query.lock().unwrap() = text.to_string();
    }

    fn query(&self) -> String {
        self.query.lock().unwrap().clone()
    }
}
