//! Stage trait and implementations.
//!
//! A stage is the caller-supplied transform run by a pool of executors: one
//! message in, zero or more messages out. Stages carry no concurrency
//! concerns of their own.

use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;

/// Trait for pipeline stages.
///
/// `M` is the message type flowing through the pipeline. Heterogeneous
/// payloads are expressed by the caller as an enum.
#[async_trait]
pub trait Stage<M>: Send + Sync + Debug
where
    M: Send + 'static,
{
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Transforms one message.
    ///
    /// Returned messages are pushed downstream in order. An error drops the
    /// message, and nothing produced for it is forwarded.
    async fn process(&self, message: M) -> anyhow::Result<Vec<M>>;
}

/// A stage backed by a synchronous closure.
pub struct FnStage<F> {
    name: String,
    func: F,
}

impl<F> FnStage<F> {
    /// Creates a new function-based stage.
    pub fn new<M>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(M) -> anyhow::Result<Vec<M>>,
    {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<M, F> Stage<M> for FnStage<F>
where
    M: Send + 'static,
    F: Fn(M) -> anyhow::Result<Vec<M>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, message: M) -> anyhow::Result<Vec<M>> {
        (self.func)(message)
    }
}

/// A stage backed by an async closure.
pub struct AsyncFnStage<F> {
    name: String,
    func: F,
}

impl<F> AsyncFnStage<F> {
    /// Creates a new async function-based stage.
    pub fn new<M, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(M) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<M>>>,
    {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for AsyncFnStage<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStage")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<M, F, Fut> Stage<M> for AsyncFnStage<F>
where
    M: Send + 'static,
    F: Fn(M) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<M>>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, message: M) -> anyhow::Result<Vec<M>> {
        (self.func)(message).await
    }
}

/// A stage that forwards every message unchanged.
#[derive(Debug, Clone)]
pub struct IdentityStage {
    name: String,
}

impl IdentityStage {
    /// Creates a new identity stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for IdentityStage {
    fn default() -> Self {
        Self::new("identity")
    }
}

#[async_trait]
impl<M> Stage<M> for IdentityStage
where
    M: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, message: M) -> anyhow::Result<Vec<M>> {
        Ok(vec![message])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_fn_stage() {
        let stage = FnStage::new("double", |x: i32| Ok(vec![x * 2]));

        assert_eq!(Stage::<i32>::name(&stage), "double");
        assert_eq!(stage.process(21).await.unwrap(), vec![42]);
    }

    #[tokio::test]
    async fn test_fn_stage_error() {
        let stage = FnStage::new("reject", |x: i32| {
            if x < 0 {
                anyhow::bail!("negative input: {x}");
            }
            Ok(vec![x])
        });

        let err = stage.process(-1).await.unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[tokio::test]
    async fn test_async_fn_stage() {
        let stage = AsyncFnStage::new("split", |x: u64| async move {
            Ok::<_, anyhow::Error>(vec![x, x])
        });

        assert_eq!(Stage::<u64>::name(&stage), "split");
        assert_eq!(stage.process(5).await.unwrap(), vec![5, 5]);
    }

    #[tokio::test]
    async fn test_fan_out_to_nothing() {
        let stage = FnStage::new("drop_all", |_: String| Ok(Vec::new()));
        assert!(stage.process("ignored".to_string()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_identity_stage() {
        let stage = IdentityStage::default();

        assert_eq!(Stage::<&str>::name(&stage), "identity");
        assert_eq!(stage.process("hello").await.unwrap(), vec!["hello"]);
    }

    #[test]
    fn test_debug_shows_name() {
        let stage = FnStage::new("named", |x: i32| Ok(vec![x]));
        assert!(format!("{stage:?}").contains("named"));
    }
}
