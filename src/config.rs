//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;
use crate::review::model::{Priority, RiskLevel};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// SLA for urgent items — auto-resolved after this long without review.
    pub sla_urgent: Duration,
    /// SLA for high-priority items.
    pub sla_high: Duration,
    /// SLA for normal items.
    pub sla_normal: Duration,
    /// How often the expiry scanner ticks.
    pub scan_interval: Duration,
    /// Caller-imposed timeout on the risk classifier.
    pub classify_timeout: Duration,
    /// Caller-imposed timeout on the response generator.
    pub generate_timeout: Duration,
    /// Text returned to the user while their message is held for review.
    pub review_placeholder: String,
    /// Priority a held item gets per risk level.
    pub priority_critical: Priority,
    pub priority_high: Priority,
    pub priority_medium: Priority,
    pub priority_low: Priority,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            sla_urgent: Duration::from_secs(15 * 60),
            sla_high: Duration::from_secs(60 * 60),
            sla_normal: Duration::from_secs(4 * 60 * 60),
            scan_interval: Duration::from_secs(30),
            classify_timeout: Duration::from_secs(10),
            generate_timeout: Duration::from_secs(30),
            review_placeholder:
                "Your message is being reviewed. Someone will respond shortly.".to_string(),
            priority_critical: Priority::Urgent,
            priority_high: Priority::High,
            priority_medium: Priority::Normal,
            priority_low: Priority::Normal,
        }
    }
}

impl TriageConfig {
    /// Load configuration from environment variables. Unset keys fall back
    /// to defaults; a key that is set but unparseable is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            sla_urgent: env_duration("TRIAGE_SLA_URGENT_MIN", 60)?
                .unwrap_or(defaults.sla_urgent),
            sla_high: env_duration("TRIAGE_SLA_HIGH_MIN", 60)?.unwrap_or(defaults.sla_high),
            sla_normal: env_duration("TRIAGE_SLA_NORMAL_MIN", 60)?
                .unwrap_or(defaults.sla_normal),
            scan_interval: env_duration("TRIAGE_SCAN_INTERVAL_SEC", 1)?
                .unwrap_or(defaults.scan_interval),
            classify_timeout: env_duration("TRIAGE_CLASSIFY_TIMEOUT_SEC", 1)?
                .unwrap_or(defaults.classify_timeout),
            generate_timeout: env_duration("TRIAGE_GENERATE_TIMEOUT_SEC", 1)?
                .unwrap_or(defaults.generate_timeout),
            review_placeholder: std::env::var("TRIAGE_REVIEW_PLACEHOLDER")
                .unwrap_or(defaults.review_placeholder),
            priority_critical: env_priority("TRIAGE_PRIORITY_CRITICAL")?
                .unwrap_or(defaults.priority_critical),
            priority_high: env_priority("TRIAGE_PRIORITY_HIGH")?
                .unwrap_or(defaults.priority_high),
            priority_medium: env_priority("TRIAGE_PRIORITY_MEDIUM")?
                .unwrap_or(defaults.priority_medium),
            priority_low: env_priority("TRIAGE_PRIORITY_LOW")?.unwrap_or(defaults.priority_low),
        })
    }

    /// SLA duration for a given priority.
    pub fn sla(&self, priority: Priority) -> Duration {
        match priority {
            Priority::Urgent => self.sla_urgent,
            Priority::High => self.sla_high,
            Priority::Normal => self.sla_normal,
        }
    }

    /// Map a risk level to a review priority using the configured table.
    ///
    /// Defaults: critical → urgent, high → high, everything else → normal.
    pub fn priority_for(&self, level: RiskLevel) -> Priority {
        match level {
            RiskLevel::Critical => self.priority_critical,
            RiskLevel::High => self.priority_high,
            RiskLevel::Medium => self.priority_medium,
            RiskLevel::Low => self.priority_low,
        }
    }
}

fn env_duration(key: &str, unit_secs: u64) -> Result<Option<Duration>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_duration(key, &raw, unit_secs).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_duration(key: &str, raw: &str, unit_secs: u64) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(|n| Duration::from_secs(n * unit_secs))
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' is not a whole number: {e}"),
        })
}

fn env_priority(key: &str) -> Result<Option<Priority>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_priority(key, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_priority(key: &str, raw: &str) -> Result<Priority, ConfigError> {
    raw.trim()
        .parse::<Priority>()
        .map_err(|message| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        })
}
