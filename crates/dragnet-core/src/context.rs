use dragnet_proxy::ProxyProvider;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Which executors must re-run even when a prior run succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ForceSet {
    #[default]
    None,
    All,
    Named(HashSet<String>),
}

pub const FORCE_ALL: &str = "all";

impl ForceSet {
    /// Builds a force set from executor names; the `"all"` sentinel wins
    /// over individual names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: HashSet<String> = names.into_iter().map(Into::into).collect();
        if names.contains(FORCE_ALL) {
            Self::All
        } else if names.is_empty() {
            Self::None
        } else {
            Self::Named(names)
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Named(names) => names.contains(name),
        }
    }
}

/// Per-run resource bundle handed to every executor invocation. Cloning
/// is cheap; all the shared pieces are behind `Arc`s or are pooled
/// handles themselves.
#[derive(Clone)]
pub struct Context {
    /// Working directory for journal entries and scratch files.
    pub dir: PathBuf,
    /// Pooled HTTP client shared by all workers of this run.
    pub session: Option<reqwest::Client>,
    pub forced: ForceSet,
    /// The global concurrency gate.
    pub semaphore: Arc<Semaphore>,
    /// Wall-clock budget for one task's whole pipeline.
    pub timeout: Duration,
    pub proxy_provider: Option<Arc<dyn ProxyProvider>>,
}

impl Context {
    /// Conventional location for a task-scoped scratch file.
    pub fn scratch_path(&self, key: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{key}.{suffix}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_set_from_names() {
        assert_eq!(ForceSet::from_names(Vec::<String>::new()), ForceSet::None);
        assert!(ForceSet::from_names(["all"]).contains("anything"));
        let named = ForceSet::from_names(["scraper"]);
        assert!(named.contains("scraper"));
        assert!(!named.contains("parse"));
    }

    #[test]
    fn all_sentinel_wins_over_named_entries() {
        let forced = ForceSet::from_names(["scraper", "all"]);
        assert_eq!(forced, ForceSet::All);
    }
}
