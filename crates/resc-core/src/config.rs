//! Worker configuration.
//!
//! Read once at startup from a JSON file, validated, then handed to the
//! worker as an immutable value.
//!
//! ```json
//! {
//!     "redis_url": "redis://127.0.0.1/",
//!     "input_queue": "trt/plantA/todo",
//!     "pending_set": "trt/plantA/todo-set",
//!     "output_queue": "global/done",
//!     "reserve_timeout_secs": 60
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::retry::RetryPolicy;
use crate::domain::ConfigError;
use crate::impls::SimulatedWork;

/// Environment variable overriding `redis_url`.
pub const REDIS_URL_ENV: &str = "RESC_REDIS_URL";

/// How the producer stores its pending set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingSetKind {
    #[default]
    Set,
    /// Members scored by enqueue time.
    SortedSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    pub input_queue: String,

    /// Defaults to `<input_queue>/taken`. Must not be shared with a worker
    /// listening on another input queue, or recovery would move its tasks
    /// into the wrong queue.
    #[serde(default)]
    pub taken_queue: Option<String>,

    /// Absent: no pending-set bookkeeping.
    #[serde(default)]
    pub pending_set: Option<String>,

    #[serde(default)]
    pub pending_set_kind: PendingSetKind,

    #[serde(default = "default_output_queue")]
    pub output_queue: String,

    #[serde(default = "default_reserve_timeout_secs")]
    pub reserve_timeout_secs: f64,

    /// Pub/sub channel receiving `"<taken_queue> DONE <ref>"` after each
    /// acknowledgment.
    #[serde(default)]
    pub events_channel: Option<String>,

    /// Where references that fail to parse go. Absent: they stay in the
    /// taken queue.
    #[serde(default)]
    pub invalid_queue: Option<String>,

    #[serde(default)]
    pub store_retry: RetryPolicy,

    #[serde(default)]
    pub simulated_work: SimulatedWork,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1/".to_string()
}

fn default_output_queue() -> String {
    "global/done".to_string()
}

fn default_reserve_timeout_secs() -> f64 {
    60.0
}

/// Resolved, validated queue and channel names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    pub input: String,
    pub taken: String,
    pub output: String,
    pub pending_set: Option<String>,
    pub invalid: Option<String>,
    pub events_channel: Option<String>,
}

impl WorkerConfig {
    /// Config with defaults for everything but the input queue.
    pub fn new(input_queue: impl Into<String>) -> Self {
        Self {
            redis_url: default_redis_url(),
            input_queue: input_queue.into(),
            taken_queue: None,
            pending_set: None,
            pending_set_kind: PendingSetKind::default(),
            output_queue: default_output_queue(),
            reserve_timeout_secs: default_reserve_timeout_secs(),
            events_channel: None,
            invalid_queue: None,
            store_retry: RetryPolicy::default(),
            simulated_work: SimulatedWork::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.queue_names()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    /// Apply environment overrides (`RESC_REDIS_URL`).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(REDIS_URL_ENV)
            && !url.is_empty()
        {
            self.redis_url = url;
        }
        self
    }

    /// `reserve_timeout_secs` as a `Duration`. Must be positive and
    /// representable.
    pub fn reserve_timeout(&self) -> Result<Duration, ConfigError> {
        match Duration::try_from_secs_f64(self.reserve_timeout_secs) {
            Ok(timeout) if !timeout.is_zero() => Ok(timeout),
            _ => Err(ConfigError::Invalid(format!(
                "reserve_timeout_secs must be a positive number of seconds, got {}",
                self.reserve_timeout_secs
            ))),
        }
    }

    /// Resolve defaults and check the whole config is usable.
    ///
    /// Every name must be non-empty and all lists must be distinct: a shared
    /// input/taken queue would make reservation a no-op, a shared
    /// taken/output queue would make recovery re-run finished work. The
    /// reserve timeout and the retry policy are checked too.
    pub fn queue_names(&self) -> Result<QueueNames, ConfigError> {
        self.reserve_timeout()?;
        self.store_retry.validate()?;

        let names = QueueNames {
            input: self.input_queue.clone(),
            taken: self
                .taken_queue
                .clone()
                .unwrap_or_else(|| format!("{}/taken", self.input_queue)),
            output: self.output_queue.clone(),
            pending_set: self.pending_set.clone(),
            invalid: self.invalid_queue.clone(),
            events_channel: self.events_channel.clone(),
        };

        check_names(&names)?;
        Ok(names)
    }
}

/// Every name must be non-empty and all lists must be distinct.
fn check_names(names: &QueueNames) -> Result<(), ConfigError> {
    let mut lists = vec![
        ("input_queue", &names.input),
        ("taken_queue", &names.taken),
        ("output_queue", &names.output),
    ];
    if let Some(invalid) = &names.invalid {
        lists.push(("invalid_queue", invalid));
    }
    for (field, name) in [
        ("pending_set", &names.pending_set),
        ("events_channel", &names.events_channel),
    ] {
        if name.as_deref() == Some("") {
            return Err(ConfigError::Invalid(format!("{field} must not be empty")));
        }
    }

    let mut seen = HashSet::new();
    for (field, name) in &lists {
        if name.is_empty() {
            return Err(ConfigError::Invalid(format!("{field} must not be empty")));
        }
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "{field} {name:?} is already used by another queue"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn minimal_json_gets_defaults() {
        let config = WorkerConfig::from_json_str(r#"{ "input_queue": "trt/plantA/todo" }"#).unwrap();

        assert_eq!(config.redis_url, "redis://127.0.0.1/");
        assert_eq!(config.output_queue, "global/done");
        assert_eq!(config.reserve_timeout().unwrap(), Duration::from_secs(60));
        assert_eq!(config.pending_set_kind, PendingSetKind::Set);

        let names = config.queue_names().unwrap();
        assert_eq!(names.taken, "trt/plantA/todo/taken");
        assert_eq!(names.pending_set, None);
    }

    #[test]
    fn full_json_is_read() {
        let config = WorkerConfig::from_json_str(
            r#"{
                "redis_url": "redis://store:6379/",
                "input_queue": "trt/plantA/todo",
                "taken_queue": "trt/plantA/taken",
                "pending_set": "trt/plantA/todo-set",
                "pending_set_kind": "sorted_set",
                "output_queue": "global/done",
                "reserve_timeout_secs": 2.5,
                "events_channel": "resc/events",
                "invalid_queue": "trt/plantA/invalid",
                "store_retry": { "base_delay_ms": 50, "max_delay_ms": 500, "multiplier": 3.0 },
                "simulated_work": { "steps": 2, "step_ms": 10 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.pending_set_kind, PendingSetKind::SortedSet);
        assert_eq!(config.reserve_timeout().unwrap(), Duration::from_millis(2_500));
        assert_eq!(config.store_retry.multiplier, 3.0);
        assert_eq!(config.simulated_work.steps, 2);

        let names = config.queue_names().unwrap();
        assert_eq!(names.taken, "trt/plantA/taken");
        assert_eq!(names.invalid.as_deref(), Some("trt/plantA/invalid"));
        assert_eq!(names.events_channel.as_deref(), Some("resc/events"));
    }

    #[test]
    fn missing_input_queue_is_a_parse_error() {
        let err = WorkerConfig::from_json_str("{}").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[rstest]
    #[case::zero_timeout(r#"{ "input_queue": "in", "reserve_timeout_secs": 0 }"#)]
    #[case::negative_timeout(r#"{ "input_queue": "in", "reserve_timeout_secs": -1 }"#)]
    #[case::huge_timeout(r#"{ "input_queue": "in", "reserve_timeout_secs": 1e30 }"#)]
    #[case::below_a_nanosecond(r#"{ "input_queue": "in", "reserve_timeout_secs": 1e-12 }"#)]
    #[case::zero_base_delay(r#"{ "input_queue": "in", "store_retry": { "base_delay_ms": 0 } }"#)]
    #[case::shrinking_backoff(r#"{ "input_queue": "in", "store_retry": { "multiplier": 0.5 } }"#)]
    #[case::negative_multiplier(r#"{ "input_queue": "in", "store_retry": { "multiplier": -2.0 } }"#)]
    #[case::max_below_base(r#"{ "input_queue": "in", "store_retry": { "base_delay_ms": 100, "max_delay_ms": 10 } }"#)]
    #[case::empty_input(r#"{ "input_queue": "" }"#)]
    #[case::input_is_taken(r#"{ "input_queue": "in", "taken_queue": "in" }"#)]
    #[case::taken_is_output(r#"{ "input_queue": "in", "taken_queue": "done", "output_queue": "done" }"#)]
    #[case::invalid_is_output(r#"{ "input_queue": "in", "invalid_queue": "global/done" }"#)]
    #[case::empty_pending_set(r#"{ "input_queue": "in", "pending_set": "" }"#)]
    fn inconsistent_config_is_rejected(#[case] json: &str) {
        let err = WorkerConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got {err:?}");
    }

    #[test]
    fn demo_config_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../demo/worker.json");
        let config = WorkerConfig::from_file(path).unwrap();
        assert_eq!(config.input_queue, "trt/plantA/todo");
        assert_eq!(config.queue_names().unwrap().taken, "trt/plantA/taken");
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = WorkerConfig::from_file("/nonexistent/resc.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/resc.json"));
    }
}
