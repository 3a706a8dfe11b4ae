use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-task configuration supplied at admission and frozen in the journal.
pub type Params = Map<String, Value>;

pub const NAME_KEY: &str = "name";
pub const PARAMS_KEY: &str = "params";
pub const URL_PARAM: &str = "url";

const STATUS_SUFFIX: &str = "_status";
const LAST_RUN_SUFFIX: &str = "_last_run";

/// Outcome of a single executor on a single task, as persisted in the
/// journal under `<step>_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Success,
    Skipped,
    Error { kind: String, message: String },
}

impl StepStatus {
    /// Whether this status counts toward a completed pipeline.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Success | Self::Skipped)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SUCCESS" => Some(Self::Success),
            "SKIPPED" => Some(Self::Skipped),
            _ => {
                let detail = raw.strip_prefix("ERROR ")?;
                let (kind, message) = detail.split_once("::").unwrap_or((detail, ""));
                Some(Self::Error {
                    kind: kind.to_string(),
                    message: message.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::Error { kind, message } => write!(f, "ERROR {kind}::{message}"),
        }
    }
}

/// One task's journal entry: a JSON object with the reserved `name` and
/// `params` keys plus `<step>`, `<step>_status`, and `<step>_last_run`
/// for every executor that has run. Unknown keys survive round-trips.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusData(Map<String, Value>);

impl StatusData {
    pub fn new(name: &str, params: Params) -> Self {
        let mut map = Map::new();
        map.insert(NAME_KEY.to_string(), Value::String(name.to_string()));
        map.insert(PARAMS_KEY.to_string(), Value::Object(params));
        Self(map)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get(NAME_KEY).and_then(Value::as_str)
    }

    pub fn set_name(&mut self, name: &str) {
        self.0
            .insert(NAME_KEY.to_string(), Value::String(name.to_string()));
    }

    pub fn params(&self) -> Option<&Params> {
        self.0.get(PARAMS_KEY).and_then(Value::as_object)
    }

    pub fn set_params(&mut self, params: Params) {
        self.0.insert(PARAMS_KEY.to_string(), Value::Object(params));
    }

    pub fn url(&self) -> Option<&str> {
        self.params()?.get(URL_PARAM)?.as_str()
    }

    pub fn step_status(&self, step: &str) -> Option<StepStatus> {
        self.0
            .get(&format!("{step}{STATUS_SUFFIX}"))
            .and_then(Value::as_str)
            .and_then(StepStatus::parse)
    }

    pub fn step_output(&self, step: &str) -> Option<&Value> {
        self.0.get(step)
    }

    pub fn last_run(&self, step: &str) -> Option<&str> {
        self.0
            .get(&format!("{step}{LAST_RUN_SUFFIX}"))
            .and_then(Value::as_str)
    }

    /// Records a successful executor run. The patch lands under the step
    /// name; `<step>_last_run` is stamped only when the executor reports
    /// it actually did work.
    pub fn record_success(&mut self, step: &str, patch: Value, updated: bool, now: DateTime<Utc>) {
        self.0.insert(step.to_string(), patch);
        self.0.insert(
            format!("{step}{STATUS_SUFFIX}"),
            Value::String(StepStatus::Success.to_string()),
        );
        if updated {
            self.0.insert(
                format!("{step}{LAST_RUN_SUFFIX}"),
                Value::String(format_timestamp(now)),
            );
        }
    }

    /// Marks a previously-successful step as skipped for this run. The
    /// step's output and `_last_run` stamp are left untouched.
    pub fn record_skip(&mut self, step: &str) {
        self.0.insert(
            format!("{step}{STATUS_SUFFIX}"),
            Value::String(StepStatus::Skipped.to_string()),
        );
    }

    /// Records a recoverable executor failure. The step's output key is
    /// removed so a SUCCESS status always implies an output is present.
    pub fn record_error(&mut self, step: &str, kind: &str, message: &str, now: DateTime<Utc>) {
        self.0.insert(
            format!("{step}{STATUS_SUFFIX}"),
            Value::String(
                StepStatus::Error {
                    kind: kind.to_string(),
                    message: message.to_string(),
                }
                .to_string(),
            ),
        );
        self.0.insert(
            format!("{step}{LAST_RUN_SUFFIX}"),
            Value::String(format_timestamp(now)),
        );
        self.0.remove(step);
    }

    /// Whether every named step settled (SUCCESS or SKIPPED) on this entry.
    pub fn is_complete<'a>(&self, steps: impl IntoIterator<Item = &'a str>) -> bool {
        steps
            .into_iter()
            .all(|step| self.step_status(step).is_some_and(|s| s.is_settled()))
    }
}

pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Derives a stable task key from a url.
pub fn url_to_key(url: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Converts an ordered url list into admission-form tasks, dropping
/// repeated urls.
pub fn urls_to_tasks(urls: &[&str]) -> Vec<(String, Params)> {
    let mut seen = std::collections::HashSet::new();
    let mut tasks = Vec::new();
    for url in urls {
        let key = url_to_key(url);
        if !seen.insert(key.clone()) {
            continue;
        }
        let mut params = Params::new();
        params.insert(URL_PARAM.to_string(), Value::String(url.to_string()));
        tasks.push((key, params));
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry() -> StatusData {
        let mut params = Params::new();
        params.insert("url".to_string(), json!("http://example.com/"));
        StatusData::new("abc", params)
    }

    #[test]
    fn step_status_round_trips_through_strings() {
        let cases = [
            StepStatus::Success,
            StepStatus::Skipped,
            StepStatus::Error {
                kind: "RuntimeError".to_string(),
                message: "HTTP response 500".to_string(),
            },
        ];
        for status in cases {
            let rendered = status.to_string();
            assert_eq!(StepStatus::parse(&rendered), Some(status));
        }
    }

    #[test]
    fn error_message_keeps_embedded_separators() {
        let parsed = StepStatus::parse("ERROR RuntimeError::bad::marker").expect("parse");
        assert_eq!(
            parsed,
            StepStatus::Error {
                kind: "RuntimeError".to_string(),
                message: "bad::marker".to_string(),
            }
        );
    }

    #[test]
    fn unknown_status_string_does_not_parse() {
        assert_eq!(StepStatus::parse("RUNNING"), None);
    }

    #[test]
    fn success_stores_output_status_and_stamp() {
        let mut status = entry();
        status.record_success("scraper", json!({"size": 3}), true, Utc::now());

        assert_eq!(status.step_status("scraper"), Some(StepStatus::Success));
        assert_eq!(status.step_output("scraper"), Some(&json!({"size": 3})));
        assert!(status.last_run("scraper").is_some());
    }

    #[test]
    fn unchanged_success_does_not_stamp_last_run() {
        let mut status = entry();
        status.record_success("scraper", json!({}), false, Utc::now());

        assert_eq!(status.step_status("scraper"), Some(StepStatus::Success));
        assert!(status.last_run("scraper").is_none());
    }

    #[test]
    fn skip_preserves_output_and_last_run() {
        let mut status = entry();
        status.record_success("scraper", json!({"size": 3}), true, Utc::now());
        let stamp = status.last_run("scraper").expect("stamp").to_string();

        status.record_skip("scraper");
        assert_eq!(status.step_status("scraper"), Some(StepStatus::Skipped));
        assert_eq!(status.step_output("scraper"), Some(&json!({"size": 3})));
        assert_eq!(status.last_run("scraper"), Some(stamp.as_str()));
    }

    #[test]
    fn error_removes_output_and_stamps() {
        let mut status = entry();
        status.record_success("scraper", json!({"size": 3}), true, Utc::now());
        status.record_error("scraper", "RuntimeError", "HTTP response 500", Utc::now());

        assert_eq!(
            status.step_status("scraper"),
            Some(StepStatus::Error {
                kind: "RuntimeError".to_string(),
                message: "HTTP response 500".to_string(),
            })
        );
        assert!(status.step_output("scraper").is_none());
        assert!(status.last_run("scraper").is_some());
    }

    #[test]
    fn is_complete_requires_every_step_settled() {
        let mut status = entry();
        status.record_success("scraper", json!({}), true, Utc::now());
        assert!(status.is_complete(["scraper"]));
        assert!(!status.is_complete(["scraper", "parse"]));

        status.record_skip("scraper");
        assert!(status.is_complete(["scraper"]));

        status.record_error("scraper", "TimeoutError", "deadline", Utc::now());
        assert!(!status.is_complete(["scraper"]));
    }

    #[test]
    fn unknown_keys_survive_serde_round_trip() {
        let raw = json!({
            "name": "abc",
            "params": {"url": "http://example.com/"},
            "operator_note": "manually checked",
        });
        let status: StatusData = serde_json::from_value(raw.clone()).expect("deserialize");
        assert_eq!(serde_json::to_value(&status).expect("serialize"), raw);
        assert_eq!(
            status.get("operator_note"),
            Some(&json!("manually checked"))
        );
    }

    #[test]
    fn url_key_is_md5_hex() {
        assert_eq!(
            url_to_key("http://www.bing.com"),
            "9cbc5ee4b61e0acb335d56e96c6b2586"
        );
    }

    #[test]
    fn urls_to_tasks_keeps_order_and_drops_duplicates() {
        let tasks = urls_to_tasks(&["http://a/", "http://b/", "http://a/"]);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].0, url_to_key("http://a/"));
        assert_eq!(tasks[1].1.get("url"), Some(&json!("http://b/")));
    }
}
