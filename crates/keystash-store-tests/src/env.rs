use serde_json::json;
use std::env;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const PREFIX_ENV: &str = "KEYSTASH_TEST_PREFIX";
pub const KEEP_ENV: &str = "KEYSTASH_TEST_KEEP";
pub const CLEANUP_ENV: &str = "KEYSTASH_TEST_CLEANUP";

/// Parsed test environment configuration.
#[derive(Debug, Clone)]
pub struct TestEnv {
    pub prefix: TestPrefix,
    /// Delete created records once the suite finishes.
    pub cleanup: bool,
}

impl TestEnv {
    pub fn from_env(backend: &str) -> Self {
        let prefix = TestPrefix::from_env(backend);

        let cleanup = if parse_bool_env(KEEP_ENV) {
            false
        } else {
            env::var(CLEANUP_ENV)
                .map(|value| parse_bool_env_value(&value, true))
                .unwrap_or(true)
        };

        Self { prefix, cleanup }
    }
}

/// Namespace isolating one test run's secret names from any other run
/// sharing the same table or bucket.
#[derive(Debug, Clone)]
pub struct TestPrefix {
    backend: String,
    base: String,
    counter: Arc<AtomicU64>,
}

impl TestPrefix {
    pub fn from_env(backend: &str) -> Self {
        if let Ok(explicit) = env::var(PREFIX_ENV) {
            return Self::new(backend, explicit);
        }

        let run_id = env::var("GITHUB_RUN_ID").ok();
        let run_attempt = env::var("GITHUB_RUN_ATTEMPT").ok();
        if let (Some(id), Some(attempt)) = (run_id, run_attempt) {
            return Self::new(backend, format!("ci-{backend}-{id}-{attempt}"));
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let pid = std::process::id();
        let mut base = String::from("local-");
        let _ = write!(&mut base, "{backend}-{now}-{pid}");
        Self::new(backend, base)
    }

    pub fn new(backend: &str, base: impl Into<String>) -> Self {
        Self {
            backend: backend.to_string(),
            base: base.into(),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the name prefix shared by every secret of this run.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Derive a unique secret name for a test case.
    pub fn name(&self, suffix: &str) -> String {
        let next = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}.{suffix}-{next}", self.base)
    }

    /// Minimal JSON metadata used in debugging output.
    pub fn to_metadata(&self) -> serde_json::Value {
        json!({
            "backend": self.backend,
            "prefix": self.base,
        })
    }
}

/// True when `var` is set to `1`, `true` or `yes`, ignoring case.
pub fn parse_bool_env(var: &str) -> bool {
    env::var(var).is_ok_and(|value| {
        ["1", "true", "yes"]
            .iter()
            .any(|truthy| value.eq_ignore_ascii_case(truthy))
    })
}

fn parse_bool_env_value(value: &str, default_true: bool) -> bool {
    match value {
        "" => default_true,
        v if v.eq_ignore_ascii_case("1") || v.eq_ignore_ascii_case("true") => true,
        v if v.eq_ignore_ascii_case("0") || v.eq_ignore_ascii_case("false") => false,
        _ => default_true,
    }
}
