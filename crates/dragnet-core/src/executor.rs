use crate::context::Context;
use crate::errors::StepError;
use async_trait::async_trait;
use dragnet_journal::StatusData;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// What one executor run produced: the JSON patch stored under the
/// executor's name, and whether real work happened. `updated = false`
/// records a success without bumping `<name>_last_run`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    pub patch: Value,
    pub updated: bool,
}

impl ExecOutcome {
    pub fn new(patch: Value) -> Self {
        Self {
            patch,
            updated: true,
        }
    }

    pub fn unchanged(patch: Value) -> Self {
        Self {
            patch,
            updated: false,
        }
    }
}

/// A named unit of work in a task pipeline. The name is the key its
/// output and status land under in the journal, so it must be stable
/// across runs.
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &str;

    async fn run(
        &self,
        ctx: &Context,
        key: &str,
        status: &StatusData,
    ) -> Result<ExecOutcome, StepError>;
}

type BoxedPatchFuture = std::pin::Pin<Box<dyn Future<Output = Result<Value, StepError>> + Send>>;

struct TaskFn {
    name: String,
    func: Box<dyn Fn(Context, String, StatusData) -> BoxedPatchFuture + Send + Sync>,
}

#[async_trait]
impl Executor for TaskFn {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        ctx: &Context,
        key: &str,
        status: &StatusData,
    ) -> Result<ExecOutcome, StepError> {
        let patch = (self.func)(ctx.clone(), key.to_string(), status.clone()).await?;
        Ok(ExecOutcome::new(patch))
    }
}

/// Adapts an async closure that returns just its own patch into the
/// executor contract, with `updated = true` on every run.
pub fn task_fn<F, Fut>(name: impl Into<String>, func: F) -> Arc<dyn Executor>
where
    F: Fn(Context, String, StatusData) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
{
    Arc::new(TaskFn {
        name: name.into(),
        func: Box::new(move |ctx, key, status| Box::pin(func(ctx, key, status))),
    })
}
