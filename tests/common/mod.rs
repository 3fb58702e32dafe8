//! Shared fakes for the consumer integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use contact_consumer::{
    BrokerError, Contact, ContactPipeline, ContactRules, ContactStore, DeadLetter, DeadLetterSink,
    Delivery, DeliveryHandler, RedeliveryPolicy, StoreError,
};

pub const QUEUE: &str = "fila_criar_contato";

/// Store that records every insert, optionally failing all of them.
#[derive(Default)]
pub struct RecordingStore {
    pub inserts: Mutex<Vec<Contact>>,
    pub attempts: Mutex<usize>,
    pub fail: bool,
    pub delay: Option<Duration>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingStore {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    /// Most inserts observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn inserted(&self) -> Vec<Contact> {
        self.inserts.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl ContactStore for RecordingStore {
    fn insert(&self, contact: &Contact) -> Result<(), StoreError> {
        *self.attempts.lock().unwrap() += 1;
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::new("connection refused"));
        }
        self.inserts.lock().unwrap().push(contact.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    Ack,
    Nak(Option<Duration>),
    Term,
}

/// Delivery that records how it was settled. Clones share the record.
#[derive(Clone)]
pub struct FakeDelivery {
    pub payload: Vec<u8>,
    pub delivered: i64,
    pub settles: Arc<Mutex<Vec<Settle>>>,
}

impl FakeDelivery {
    pub fn new(payload: &[u8], delivered: i64) -> Self {
        Self {
            payload: payload.to_vec(),
            delivered,
            settles: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn settles(&self) -> Vec<Settle> {
        self.settles.lock().unwrap().clone()
    }
}

#[async_trait]
impl Delivery for FakeDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn delivered(&self) -> i64 {
        self.delivered
    }

    async fn acknowledge(&self) -> Result<(), BrokerError> {
        self.settles.lock().unwrap().push(Settle::Ack);
        Ok(())
    }

    async fn redeliver(&self, delay: Option<Duration>) -> Result<(), BrokerError> {
        self.settles.lock().unwrap().push(Settle::Nak(delay));
        Ok(())
    }

    async fn terminate(&self) -> Result<(), BrokerError> {
        self.settles.lock().unwrap().push(Settle::Term);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingDeadLetters {
    pub letters: Mutex<Vec<DeadLetter>>,
    pub fail: bool,
}

impl RecordingDeadLetters {
    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterSink for RecordingDeadLetters {
    async fn publish(&self, letter: &DeadLetter) -> Result<(), BrokerError> {
        if self.fail {
            return Err(BrokerError::Publish {
                subject: format!("{}_dlq", QUEUE),
                source: "no responders".into(),
            });
        }
        self.letters.lock().unwrap().push(letter.clone());
        Ok(())
    }
}

pub fn handler(
    store: Arc<RecordingStore>,
    rules: ContactRules,
    policy: RedeliveryPolicy,
    dead_letters: Option<Arc<RecordingDeadLetters>>,
) -> DeliveryHandler {
    let dead_letters = dead_letters.map(|sink| sink as Arc<dyn DeadLetterSink>);
    DeliveryHandler::new(ContactPipeline::new(store, rules), policy, dead_letters, QUEUE)
}

/// Counts events per level for the subscriber it is installed on.
#[derive(Clone, Default)]
pub struct LogCounter {
    counts: Arc<Mutex<HashMap<Level, usize>>>,
}

impl LogCounter {
    pub fn count(&self, level: Level) -> usize {
        self.counts.lock().unwrap().get(&level).copied().unwrap_or(0)
    }
}

impl<S: Subscriber> Layer<S> for LogCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        *self
            .counts
            .lock()
            .unwrap()
            .entry(*event.metadata().level())
            .or_default() += 1;
    }
}
