//! Stages with controllable behaviour for exercising pipelines.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::stages::Stage;

type Predicate<M> = Box<dyn Fn(&M) -> bool + Send + Sync>;

/// A stage that fails for messages matching a predicate and forwards the rest.
pub struct FailingStage<M> {
    name: String,
    error: String,
    predicate: Predicate<M>,
    failures: AtomicUsize,
}

impl<M> FailingStage<M> {
    /// Creates a stage failing whenever `predicate` returns true.
    pub fn new<P>(name: impl Into<String>, error: impl Into<String>, predicate: P) -> Self
    where
        P: Fn(&M) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            error: error.into(),
            predicate: Box::new(predicate),
            failures: AtomicUsize::new(0),
        }
    }

    /// Creates a stage failing on every message.
    #[must_use]
    pub fn always(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(name, error, |_| true)
    }

    /// Returns how many messages were rejected.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl<M> std::fmt::Debug for FailingStage<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailingStage")
            .field("name", &self.name)
            .field("error", &self.error)
            .field("failures", &self.failure_count())
            .finish()
    }
}

#[async_trait]
impl<M> Stage<M> for FailingStage<M>
where
    M: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, message: M) -> anyhow::Result<Vec<M>> {
        if (self.predicate)(&message) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("{}", self.error);
        }
        Ok(vec![message])
    }
}

/// A pass-through stage that takes time to execute.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    delay: Duration,
}

impl SlowStage {
    /// Creates a new slow stage.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }

    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self::new(name, Duration::from_millis(ms))
    }
}

#[async_trait]
impl<M> Stage<M> for SlowStage
where
    M: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, message: M) -> anyhow::Result<Vec<M>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![message])
    }
}

/// A pass-through stage that holds every message until released.
///
/// Each call waits for one permit. [`BlockingStage::open`] lets every
/// current and future call through.
#[derive(Debug)]
pub struct BlockingStage {
    name: String,
    gate: Semaphore,
    entered: AtomicUsize,
}

impl BlockingStage {
    /// Creates a closed blocking stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gate: Semaphore::new(0),
            entered: AtomicUsize::new(0),
        }
    }

    /// Lets `count` more calls complete.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Lets all calls complete from now on.
    pub fn open(&self) {
        self.gate.close();
    }

    /// Returns how many calls have started.
    #[must_use]
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<M> Stage<M> for BlockingStage
where
    M: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, message: M) -> anyhow::Result<Vec<M>> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        // A closed gate means open(); every acquire then fails immediately.
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        Ok(vec![message])
    }
}

/// A pass-through stage recording each message and when processing began.
#[derive(Debug)]
pub struct RecordingStage<M> {
    name: String,
    delay: Duration,
    records: Mutex<Vec<(M, Instant)>>,
}

impl<M> RecordingStage<M>
where
    M: Clone,
{
    /// Creates a new recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delay: Duration::ZERO,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Adds a processing delay after each message is recorded.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the recorded messages in processing-start order.
    #[must_use]
    pub fn messages(&self) -> Vec<M> {
        self.records.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    /// Returns the instants at which processing began.
    #[must_use]
    pub fn started_at(&self) -> Vec<Instant> {
        self.records.lock().iter().map(|(_, at)| *at).collect()
    }

    /// Returns the number of processed messages.
    #[must_use]
    pub fn count(&self) -> usize {
        self.records.lock().len()
    }
}

#[async_trait]
impl<M> Stage<M> for RecordingStage<M>
where
    M: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, message: M) -> anyhow::Result<Vec<M>> {
        self.records.lock().push((message.clone(), Instant::now()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(vec![message])
    }
}
