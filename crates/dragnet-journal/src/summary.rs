use crate::entry::StatusData;
use crate::files::{JournalError, scan};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::Path;

const STATUS_SUFFIX: &str = "_status";

/// Tabular dump of every journal entry in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalSnapshot {
    pub tasks: Vec<TaskRow>,
    pub corrupt: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub name: String,
    pub url: Option<String>,
    pub steps: Vec<StepRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRow {
    pub step: String,
    pub status: String,
    pub last_run: Option<String>,
}

impl JournalSnapshot {
    pub async fn scan(directory: &Path) -> Result<Self, JournalError> {
        let outcome = scan(directory).await?;
        let mut snapshot = Self::from_entries(&outcome.entries);
        snapshot.corrupt = outcome.corrupt.len();
        Ok(snapshot)
    }

    pub fn from_entries(entries: &[StatusData]) -> Self {
        let tasks = entries
            .iter()
            .map(|entry| TaskRow {
                name: entry.name().unwrap_or_default().to_string(),
                url: entry.url().map(str::to_string),
                steps: step_rows(entry),
            })
            .collect();
        Self { tasks, corrupt: 0 }
    }
}

fn step_rows(entry: &StatusData) -> Vec<StepRow> {
    entry
        .as_map()
        .iter()
        .filter_map(|(key, value)| {
            let step = key.strip_suffix(STATUS_SUFFIX)?;
            Some(StepRow {
                step: step.to_string(),
                status: value.as_str().unwrap_or_default().to_string(),
                last_run: entry.last_run(step).map(str::to_string),
            })
        })
        .collect()
}

impl Display for JournalSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} tasks ({} corrupt)", self.tasks.len(), self.corrupt)?;
        for task in &self.tasks {
            match &task.url {
                Some(url) => writeln!(f, "  {} {}", task.name, url)?,
                None => writeln!(f, "  {}", task.name)?,
            }
            for step in &task.steps {
                match &step.last_run {
                    Some(last_run) => {
                        writeln!(f, "    {}: {} (last run {})", step.step, step.status, last_run)?
                    }
                    None => writeln!(f, "    {}: {}", step.step, step.status)?,
                }
            }
        }
        Ok(())
    }
}

/// Counts of each distinct `<step>_status` value, per step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusHistogram {
    counts: BTreeMap<String, BTreeMap<String, usize>>,
}

impl StatusHistogram {
    pub async fn scan(directory: &Path) -> Result<Self, JournalError> {
        let outcome = scan(directory).await?;
        Ok(Self::from_entries(&outcome.entries))
    }

    pub fn from_entries(entries: &[StatusData]) -> Self {
        let mut counts: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        for entry in entries {
            for (key, value) in entry.as_map() {
                let Some(step) = key.strip_suffix(STATUS_SUFFIX) else {
                    continue;
                };
                let Value::String(status) = value else {
                    continue;
                };
                *counts
                    .entry(status.clone())
                    .or_default()
                    .entry(step.to_string())
                    .or_default() += 1;
            }
        }
        Self { counts }
    }

    pub fn count(&self, status: &str, step: &str) -> usize {
        self.counts
            .get(status)
            .and_then(|per_step| per_step.get(step))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self, status: &str) -> usize {
        self.counts
            .get(status)
            .map(|per_step| per_step.values().sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Status values ordered by total count, largest first.
    pub fn statuses(&self) -> Vec<&str> {
        let mut statuses: Vec<&str> = self.counts.keys().map(String::as_str).collect();
        statuses.sort_by_key(|status| std::cmp::Reverse(self.total(status)));
        statuses
    }
}

impl Display for StatusHistogram {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for status in self.statuses() {
            let per_step = &self.counts[status];
            let parts: Vec<String> = per_step
                .iter()
                .map(|(step, count)| format!("{step}={count}"))
                .collect();
            writeln!(
                f,
                "{status}: {} (total {})",
                parts.join(", "),
                self.total(status)
            )?;
        }
        Ok(())
    }
}
