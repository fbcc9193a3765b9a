// Activation metrics module
//
// Lightweight counters for what the engine did during this process lifetime

use crate::services::activation::{ActivationReport, DeactivationReport};
use crate::state::StateChange;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide activation metrics
///
/// Uses atomic operations for thread-safe tracking without locks.
/// Logged on shutdown with [`Metrics::log_summary`].
#[derive(Debug)]
pub struct Metrics {
    /// Completed activation passes
    pub activations: AtomicU64,

    /// Completed standalone deactivations
    pub deactivations: AtomicU64,

    /// Symlinks created
    pub links_created: AtomicU64,

    /// Enabled mods that were absent from the library
    pub mods_missing: AtomicU64,

    /// Per-mod link failures (collision or I/O)
    pub link_failures: AtomicU64,

    /// Managed entries removed while clearing the directory
    pub links_removed: AtomicU64,

    /// Managed entries that could not be removed
    pub removal_failures: AtomicU64,

    /// Number of persisted state updates
    pub state_updates: AtomicU64,

    /// Number of state change events published
    pub state_broadcasts: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            activations: AtomicU64::new(0),
            deactivations: AtomicU64::new(0),
            links_created: AtomicU64::new(0),
            mods_missing: AtomicU64::new(0),
            link_failures: AtomicU64::new(0),
            links_removed: AtomicU64::new(0),
            removal_failures: AtomicU64::new(0),
            state_updates: AtomicU64::new(0),
            state_broadcasts: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a finished activation, including its clearing pass
    pub fn record_activation(&self, report: &ActivationReport) {
        let counts = report.counts();
        self.activations.fetch_add(1, Ordering::Relaxed);
        self.links_created
            .fetch_add(counts.created as u64, Ordering::Relaxed);
        self.mods_missing
            .fetch_add(counts.missing as u64, Ordering::Relaxed);
        self.link_failures
            .fetch_add(counts.failed as u64, Ordering::Relaxed);
        self.record_clearing(&report.cleared);
    }

    /// Record a standalone deactivation
    pub fn record_deactivation(&self, report: &DeactivationReport) {
        self.deactivations.fetch_add(1, Ordering::Relaxed);
        self.record_clearing(report);
    }

    fn record_clearing(&self, report: &DeactivationReport) {
        self.links_removed
            .fetch_add(report.removed_count() as u64, Ordering::Relaxed);
        self.removal_failures
            .fetch_add(report.failures.len() as u64, Ordering::Relaxed);
    }

    /// Record a persisted state update and the events it published
    pub fn record_state_update(&self, changes: &[StateChange]) {
        self.state_updates.fetch_add(1, Ordering::Relaxed);
        self.state_broadcasts
            .fetch_add(changes.len() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Activation Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Activations: {}, deactivations: {}",
            self.activations.load(Ordering::Relaxed),
            self.deactivations.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Links: {} created, {} missing, {} failed",
            self.links_created.load(Ordering::Relaxed),
            self.mods_missing.load(Ordering::Relaxed),
            self.link_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Cleared: {} removed, {} removal failures",
            self.links_removed.load(Ordering::Relaxed),
            self.removal_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "State updates: {}, broadcasts: {}",
            self.state_updates.load(Ordering::Relaxed),
            self.state_broadcasts.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InstanceId, ModId};
    use crate::services::activation::{FailureReason, ModOutcome, ModStatus, RemovalFailure};
    use camino::Utf8PathBuf;
    use std::path::PathBuf;
    use std::thread;

    fn report() -> ActivationReport {
        ActivationReport {
            instance: InstanceId::new("realism"),
            cleared: DeactivationReport {
                removed: vec![PathBuf::from("/paks/ronmgr_Old.pak")],
                failures: vec![RemovalFailure {
                    path: PathBuf::from("/paks/ronmgr_Stuck.pak"),
                    reason: "permission denied".to_string(),
                }],
            },
            outcomes: vec![
                ModOutcome {
                    mod_id: ModId::from("A.pak"),
                    status: ModStatus::Created {
                        link: Utf8PathBuf::from("/paks/ronmgr_A.pak"),
                    },
                },
                ModOutcome {
                    mod_id: ModId::from("B.pak"),
                    status: ModStatus::Missing,
                },
                ModOutcome {
                    mod_id: ModId::from("C.pak"),
                    status: ModStatus::Failed(FailureReason::Io("exists".to_string())),
                },
            ],
        }
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.activations.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.links_created.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_activation() {
        let metrics = Metrics::new();
        metrics.record_activation(&report());

        assert_eq!(metrics.activations.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.links_created.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.mods_missing.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.link_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.links_removed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.removal_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_record_deactivation_and_state() {
        let metrics = Metrics::new();
        metrics.record_deactivation(&DeactivationReport {
            removed: vec![PathBuf::from("a"), PathBuf::from("b")],
            failures: Vec::new(),
        });
        metrics.record_state_update(&[StateChange::ActiveInstanceChanged {
            previous: Some(InstanceId::new("realism")),
            current: None,
        }]);

        assert_eq!(metrics.deactivations.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.links_removed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.state_updates.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.state_broadcasts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_uptime() {
        let metrics = Metrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
