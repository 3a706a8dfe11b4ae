use crate::context::{Context, ForceSet};
use crate::errors::{EngineError, StepError};
use crate::executor::Executor;
use chrono::Utc;
use dragnet_journal::{Params, StatusData};
use dragnet_proxy::ProxyProvider;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout_at};

// Some sites return 406 with the default user agent.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/97.0.4692.99 Safari/537.36";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// The HTTP client pools at most ~100 connections per host, and each
// admitted worker holds an open scratch file while scraping.
const MAX_PARALLELISM: usize = 100;

/// The task list handed to `execute`: admission form carries fresh
/// params, replay form re-runs keys whose journal entry already exists.
#[derive(Debug, Clone, PartialEq)]
pub enum Tasks {
    Admit(Vec<(String, Params)>),
    Replay(Vec<String>),
}

impl Tasks {
    fn into_pairs(self) -> Vec<(String, Option<Params>)> {
        match self {
            Self::Admit(tasks) => tasks
                .into_iter()
                .map(|(key, params)| (key, Some(params)))
                .collect(),
            Self::Replay(keys) => keys.into_iter().map(|key| (key, None)).collect(),
        }
    }
}

impl From<Vec<(String, Params)>> for Tasks {
    fn from(tasks: Vec<(String, Params)>) -> Self {
        Self::Admit(tasks)
    }
}

impl From<Vec<String>> for Tasks {
    fn from(keys: Vec<String>) -> Self {
        Self::Replay(keys)
    }
}

impl From<Vec<&str>> for Tasks {
    fn from(keys: Vec<&str>) -> Self {
        Self::Replay(keys.into_iter().map(str::to_string).collect())
    }
}

/// Knobs for one `execute` call.
pub struct ExecuteOptions {
    /// Wall-clock budget for each task's whole pipeline.
    pub timeout: Duration,
    pub force: ForceSet,
    /// Clamped to `[1, 100]`; defaults to the upper bound.
    pub max_parallelism: Option<usize>,
    pub proxy_provider: Option<Arc<dyn ProxyProvider>>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            force: ForceSet::None,
            max_parallelism: None,
            proxy_provider: None,
        }
    }
}

/// Runs every task through the executor pipeline under the concurrency
/// and timeout budgets, persisting per-task progress to the journal
/// after every step.
///
/// Returns the keys whose pipeline ended with every executor settled
/// (SUCCESS or SKIPPED), in admission order. Recoverable step failures
/// are captured into the journal and never abort sibling tasks; fatal
/// errors escape after all workers have been joined.
pub async fn execute(
    executors: &[Arc<dyn Executor>],
    directory: &Path,
    tasks: impl Into<Tasks>,
    options: ExecuteOptions,
) -> Result<Vec<String>, EngineError> {
    let tasks = tasks.into().into_pairs();
    validate_keys(tasks.iter().map(|(key, _)| key.as_str()))?;

    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|e| EngineError::Scratch {
            path: directory.display().to_string(),
            detail: e.to_string(),
        })?;

    let parallelism = options
        .max_parallelism
        .unwrap_or(MAX_PARALLELISM)
        .clamp(1, MAX_PARALLELISM);
    let session = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(EngineError::HttpClient)?;
    let ctx = Context {
        dir: directory.to_path_buf(),
        session: Some(session),
        forced: options.force,
        semaphore: Arc::new(Semaphore::new(parallelism)),
        timeout: options.timeout,
        proxy_provider: options.proxy_provider,
    };

    let executors: Arc<[Arc<dyn Executor>]> = executors.to_vec().into();
    let mut workers = Vec::with_capacity(tasks.len());
    for (key, params) in tasks {
        let worker = tokio::spawn(run_chain(
            ctx.clone(),
            Arc::clone(&executors),
            key.clone(),
            params,
        ));
        workers.push((key, worker));
    }

    let total = workers.len();
    let mut completed = Vec::new();
    let mut fatal = None;
    for (key, worker) in workers {
        match worker.await {
            Ok(Ok(true)) => completed.push(key),
            Ok(Ok(false)) => {}
            Ok(Err(error)) => {
                tracing::error!(task = %key, "fatal error: {error}");
                fatal.get_or_insert(error);
            }
            Err(join_error) => {
                fatal.get_or_insert(EngineError::InvariantViolation(format!(
                    "worker for {key} did not finish: {join_error}"
                )));
            }
        }
    }
    if let Some(error) = fatal {
        return Err(error);
    }

    tracing::info!(total, completed = completed.len(), "run finished");
    Ok(completed)
}

/// Drives one task through the executors in order. Returns whether the
/// task's pipeline ended fully settled.
async fn run_chain(
    ctx: Context,
    executors: Arc<[Arc<dyn Executor>]>,
    key: String,
    params: Option<Params>,
) -> Result<bool, EngineError> {
    let _permit = ctx
        .semaphore
        .acquire()
        .await
        .map_err(|e| EngineError::InvariantViolation(format!("concurrency gate closed: {e}")))?;

    let mut status = match (dragnet_journal::load(&ctx.dir, &key).await?, params) {
        (Some(mut existing), Some(params)) => {
            existing.set_name(&key);
            existing.set_params(params);
            existing
        }
        (Some(mut existing), None) => {
            existing.set_name(&key);
            existing
        }
        (None, Some(params)) => StatusData::new(&key, params),
        (None, None) => {
            tracing::warn!(task = %key, "replayed task has no journal entry");
            return Ok(false);
        }
    };
    dragnet_journal::save(&ctx.dir, &key, &status).await?;

    // One deadline covers the whole pipeline for this task, not each
    // executor separately.
    let deadline = Instant::now() + ctx.timeout;
    for executor in executors.iter() {
        let step = executor.name();

        let settled = status.step_status(step).is_some_and(|s| s.is_settled());
        if settled && !ctx.forced.contains(step) {
            status.record_skip(step);
            dragnet_journal::save(&ctx.dir, &key, &status).await?;
            continue;
        }

        let result = match timeout_at(deadline, executor.run(&ctx, &key, &status)).await {
            Ok(result) => result,
            Err(_) => Err(StepError::Timeout),
        };
        match result {
            Ok(outcome) => {
                status.record_success(step, outcome.patch, outcome.updated, Utc::now());
                dragnet_journal::save(&ctx.dir, &key, &status).await?;
            }
            Err(StepError::Fatal(error)) => {
                dragnet_journal::save(&ctx.dir, &key, &status).await?;
                return Err(error);
            }
            Err(error) => {
                tracing::error!(task = %key, step, kind = error.kind(), "step failed: {error}");
                status.record_error(step, error.kind(), &error.to_string(), Utc::now());
                dragnet_journal::save(&ctx.dir, &key, &status).await?;
                return Ok(false);
            }
        }
    }

    Ok(status.is_complete(executors.iter().map(|e| e.name())))
}

fn validate_keys<'a>(keys: impl Iterator<Item = &'a str>) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for key in keys {
        if key.is_empty() || key == "." || key == ".." || key.contains('/') {
            return Err(EngineError::InvalidKey(key.to_string()));
        }
        if !seen.insert(key) {
            duplicates.push(key.to_string());
        }
    }
    if !duplicates.is_empty() {
        return Err(EngineError::DuplicateKeys(duplicates));
    }
    Ok(())
}
