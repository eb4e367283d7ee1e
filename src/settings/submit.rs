//! Batch submission of a changeset: one independent remote write per key.
//!
//! All writes are started together and the batch always waits for every one
//! to settle. There is no rollback; the backend has no transactional write, so
//! partial progress is kept and the failed keys stay dirty for the next save.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Serialize;

use crate::error::AppError;

use super::diff::ChangeSet;

/// Remote sink for single-option writes (`PUT /api/option/`).
#[async_trait]
pub trait OptionWriter: Send + Sync {
    async fn write_option(&self, key: &str, value: &str) -> Result<(), AppError>;
}

#[async_trait]
impl<W: OptionWriter + ?Sized> OptionWriter for Arc<W> {
    async fn write_option(&self, key: &str, value: &str) -> Result<(), AppError> {
        (**self).write_option(key, value).await
    }
}

#[async_trait]
impl<W: OptionWriter + ?Sized> OptionWriter for &W {
    async fn write_option(&self, key: &str, value: &str) -> Result<(), AppError> {
        (**self).write_option(key, value).await
    }
}

/// Settled outcome of every write in a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub attempted: usize,
    pub succeeded_keys: BTreeSet<String>,
    pub failed_keys: BTreeMap<String, String>,
}

/// How a batch result should be surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchReport {
    Saved,
    /// The only key in the batch failed.
    Failed { key: String, reason: String },
    /// More than one key was written and at least one failed. Retryable.
    PartialFailure { failed: BTreeMap<String, String> },
}

impl BatchResult {
    pub fn succeeded(&self) -> HashSet<String> {
        self.succeeded_keys.iter().cloned().collect()
    }

    pub fn report(&self) -> BatchReport {
        if self.failed_keys.is_empty() {
            return BatchReport::Saved;
        }
        if self.attempted == 1 {
            if let Some((key, reason)) = self.failed_keys.iter().next() {
                return BatchReport::Failed {
                    key: key.clone(),
                    reason: reason.clone(),
                };
            }
        }
        BatchReport::PartialFailure {
            failed: self.failed_keys.clone(),
        }
    }
}

pub struct BatchSubmitter<W> {
    writer: W,
}

impl<W: OptionWriter> BatchSubmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Fan out one write per change and wait for all of them.
    pub async fn submit(&self, change_set: &ChangeSet) -> BatchResult {
        let writes = change_set.iter().map(|change| async move {
            let outcome = self.writer.write_option(change.key, &change.value).await;
            (change.key, outcome)
        });
        let settled = join_all(writes).await;

        let mut result = BatchResult {
            attempted: settled.len(),
            ..BatchResult::default()
        };
        for (key, outcome) in settled {
            match outcome {
                Ok(()) => {
                    result.succeeded_keys.insert(key.to_string());
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Option write failed");
                    result.failed_keys.insert(key.to_string(), e.to_string());
                }
            }
        }

        tracing::info!(
            attempted = result.attempted,
            succeeded = result.succeeded_keys.len(),
            failed = result.failed_keys.len(),
            "Option batch settled",
        );
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::settings::diff::Change;
    use crate::settings::schema::SettingShape;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory writer that records every call and fails the configured keys.
    #[derive(Default)]
    pub(crate) struct RecordingWriter {
        pub calls: Mutex<Vec<(String, String)>>,
        pub failing: HashSet<String>,
    }

    impl RecordingWriter {
        pub fn failing(keys: &[&str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failing: keys.iter().map(|k| k.to_string()).collect(),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl OptionWriter for RecordingWriter {
        async fn write_option(&self, key: &str, value: &str) -> Result<(), AppError> {
            self.calls
                .lock()
                .unwrap()
                .push((key.to_string(), value.to_string()));
            if self.failing.contains(key) {
                return Err(AppError::Api {
                    status: 200,
                    message: format!("rejected {key}"),
                });
            }
            Ok(())
        }
    }

    fn changes(keys: &[&'static str]) -> ChangeSet {
        keys.iter()
            .map(|key| Change {
                key: *key,
                shape: SettingShape::Text,
                value: format!("{key}-value"),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_all_writes_succeed() {
        let submitter = BatchSubmitter::new(RecordingWriter::default());
        let result = submitter.submit(&changes(&["A", "B"])).await;
        assert_eq!(result.attempted, 2);
        assert_eq!(result.report(), BatchReport::Saved);
        assert_eq!(submitter.writer().call_count(), 2);
    }

    #[tokio::test]
    async fn test_does_not_short_circuit_on_failure() {
        let submitter = BatchSubmitter::new(RecordingWriter::failing(&["A"]));
        let result = submitter.submit(&changes(&["A", "B", "C"])).await;
        assert_eq!(submitter.writer().call_count(), 3);
        assert_eq!(
            result.succeeded_keys,
            ["B", "C"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );
        assert!(matches!(result.report(), BatchReport::PartialFailure { failed } if failed.contains_key("A")));
    }

    #[tokio::test]
    async fn test_single_key_failure_is_plain_failure() {
        let submitter = BatchSubmitter::new(RecordingWriter::failing(&["A"]));
        let result = submitter.submit(&changes(&["A"])).await;
        assert_eq!(
            result.report(),
            BatchReport::Failed {
                key: "A".into(),
                reason: "API error (200): rejected A".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_empty_changeset_issues_no_writes() {
        let submitter = BatchSubmitter::new(RecordingWriter::default());
        let result = submitter.submit(&ChangeSet::default()).await;
        assert_eq!(result.attempted, 0);
        assert_eq!(submitter.writer().call_count(), 0);
    }

    struct SlowWriter {
        in_flight: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl OptionWriter for SlowWriter {
        async fn write_option(&self, _key: &str, _value: &str) -> Result<(), AppError> {
            use std::sync::atomic::Ordering;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_are_issued_concurrently() {
        let submitter = BatchSubmitter::new(SlowWriter {
            in_flight: 0.into(),
            peak: 0.into(),
        });
        submitter.submit(&changes(&["A", "B", "C"])).await;
        assert_eq!(
            submitter.writer().peak.load(std::sync::atomic::Ordering::SeqCst),
            3
        );
    }
}
