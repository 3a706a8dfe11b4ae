pub mod context;
pub mod errors;
pub mod executor;
pub mod scheduler;

pub use context::{Context, FORCE_ALL, ForceSet};
pub use dragnet_proxy::{ProxyError, ProxyPool, ProxyProvider};
pub use errors::{EngineError, StepError};
pub use executor::{ExecOutcome, Executor, task_fn};
pub use scheduler::{ExecuteOptions, Tasks, USER_AGENT, execute};
