//! Configuration for SLA enforcement

use serde::{Deserialize, Serialize};

/// SLA scanner and notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaConfig {
    /// Scan interval in seconds
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Job name, used as the distributed-lock key — must be globally
    /// unique per deployment
    #[serde(default = "default_job_name")]
    pub job_name: String,

    /// How long a runner's lock lease lasts before another runner may
    /// take over, in seconds
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,

    /// Re-notify window in seconds: an escalation older than this is
    /// escalated again. `None` escalates strictly once per level.
    #[serde(default)]
    pub renotify_after_secs: Option<u64>,

    /// How long a sent notification suppresses duplicates, in seconds
    #[serde(default = "default_dedup_ttl")]
    pub dedup_ttl_secs: u64,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            job_name: default_job_name(),
            lock_ttl_secs: default_lock_ttl(),
            renotify_after_secs: None,
            dedup_ttl_secs: default_dedup_ttl(),
        }
    }
}

impl SlaConfig {
    pub fn scan_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scan_interval_secs)
    }

    pub fn lock_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lock_ttl_secs as i64)
    }

    pub fn renotify_after(&self) -> Option<chrono::Duration> {
        self.renotify_after_secs
            .map(|secs| chrono::Duration::seconds(secs as i64))
    }

    pub fn dedup_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedup_ttl_secs as i64)
    }
}

// Default value helpers
fn default_scan_interval() -> u64 {
    60
}

fn default_job_name() -> String {
    "ticket-sla-scan".to_string()
}

fn default_lock_ttl() -> u64 {
    120
}

fn default_dedup_ttl() -> u64 {
    24 * 60 * 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SlaConfig::default();
        assert_eq!(config.scan_interval_secs, 60);
        assert_eq!(config.job_name, "ticket-sla-scan");
        assert_eq!(config.renotify_after_secs, None);
        assert_eq!(config.dedup_ttl_secs, 86_400);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SlaConfig = serde_json::from_str(r#"{"scan_interval_secs": 30}"#).unwrap();
        assert_eq!(config.scan_interval_secs, 30);
        assert_eq!(config.job_name, "ticket-sla-scan");
        assert_eq!(config.lock_ttl_secs, 120);
    }

    #[test]
    fn test_duration_helpers() {
        let config = SlaConfig {
            renotify_after_secs: Some(3600),
            ..Default::default()
        };
        assert_eq!(config.scan_interval(), std::time::Duration::from_secs(60));
        assert_eq!(config.renotify_after(), Some(chrono::Duration::hours(1)));
        assert_eq!(config.dedup_ttl(), chrono::Duration::hours(24));
    }
}
