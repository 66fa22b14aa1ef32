//! External enrichment
//!
//! `BatchEnricher` feeds a batch of records through an `EnrichmentClient`,
//! one request per record, and tallies the relevance of each answer. A batch
//! is abandoned when the very first request fails or when failures pile up
//! back to back; whatever was enriched until then is still reported.

mod error;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

pub use error::ExternalApiError;

use crate::core::constants::{
    ENRICH_DOUBT_RELEVANCE, ENRICH_MAX_CONSECUTIVE_FAILURES, ENRICH_SUCCESS_RELEVANCE,
};

/// Values found for one input, with the service's confidence in them
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub values: Vec<String>,
    pub relevance: f64,
}

#[async_trait]
pub trait EnrichmentClient: Send + Sync {
    /// Look one input up; `Ok(None)` means the service found nothing
    async fn enrich(&self, input: &str) -> Result<Option<Enrichment>, ExternalApiError>;

    /// Checked once before a batch starts, e.g. for credentials
    fn ensure_ready(&self) -> Result<(), ExternalApiError> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceBucket {
    Success,
    Doubt,
    Failed,
}

impl RelevanceBucket {
    pub fn classify(relevance: f64) -> Self {
        if relevance > ENRICH_SUCCESS_RELEVANCE {
            Self::Success
        } else if relevance > ENRICH_DOUBT_RELEVANCE {
            Self::Doubt
        } else {
            Self::Failed
        }
    }
}

/// Live counters of a running batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichProgress {
    pub success: usize,
    pub doubt: usize,
    pub failed: usize,
    pub processed: usize,
    pub total: usize,
    pub in_progress: bool,
}

impl EnrichProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }

    fn count(&mut self, bucket: RelevanceBucket) {
        match bucket {
            RelevanceBucket::Success => self.success += 1,
            RelevanceBucket::Doubt => self.doubt += 1,
            RelevanceBucket::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The first request of the batch failed
    FailedAtStart,
    /// This many requests failed in a row
    ConsecutiveFailures(usize),
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichReport {
    /// Input records with the enrichment values appended
    pub enriched: Vec<Vec<String>>,
    pub success: usize,
    pub doubt: usize,
    pub failed: usize,
    pub errors: Vec<ExternalApiError>,
    pub aborted: Option<AbortReason>,
    pub interrupted: bool,
}

pub struct BatchEnricher {
    client: Arc<dyn EnrichmentClient>,
    interrupt: Arc<AtomicBool>,
    progress: Mutex<EnrichProgress>,
}

impl BatchEnricher {
    pub fn new(client: Arc<dyn EnrichmentClient>) -> Self {
        Self {
            client,
            interrupt: Arc::new(AtomicBool::new(false)),
            progress: Mutex::new(EnrichProgress::default()),
        }
    }

    /// Flag that stops a running batch before its next request
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub fn progress(&self) -> EnrichProgress {
        self.progress.lock().clone()
    }

    /// Enrich each record, joined with spaces, in order
    pub async fn run(&self, records: &[Vec<String>]) -> Result<EnrichReport, ExternalApiError> {
        self.client.ensure_ready()?;
        self.interrupt.store(false, Ordering::SeqCst);
        *self.progress.lock() = EnrichProgress {
            total: records.len(),
            in_progress: true,
            ..EnrichProgress::default()
        };
        tracing::debug!(client = self.client.name(), records = records.len(), "Starting enrichment batch");

        let mut report = EnrichReport::default();
        let mut consecutive_failures = 0usize;

        for record in records {
            if self.interrupt.swap(false, Ordering::SeqCst) {
                tracing::info!(client = self.client.name(), "Enrichment batch interrupted");
                report.interrupted = true;
                break;
            }

            let input = record.join(" ");
            match self.client.enrich(&input).await {
                Ok(found) => {
                    let bucket = match found {
                        Some(enrichment) => {
                            let mut row = record.clone();
                            row.extend(enrichment.values);
                            report.enriched.push(row);
                            RelevanceBucket::classify(enrichment.relevance)
                        }
                        None => RelevanceBucket::Failed,
                    };
                    let mut progress = self.progress.lock();
                    progress.count(bucket);
                    progress.processed += 1;
                    consecutive_failures = 0;
                }
                Err(e) => {
                    tracing::warn!(input = %input, kind = e.kind(), error = %e, "Enrichment request failed");
                    report.errors.push(e);
                    consecutive_failures += 1;
                }
            }

            let processed = self.progress.lock().processed;
            if processed == 0 && consecutive_failures == 1 {
                report.aborted = Some(AbortReason::FailedAtStart);
            } else if consecutive_failures >= ENRICH_MAX_CONSECUTIVE_FAILURES {
                report.aborted = Some(AbortReason::ConsecutiveFailures(consecutive_failures));
            }
            if let Some(reason) = report.aborted {
                tracing::warn!(client = self.client.name(), reason = ?reason, "Enrichment batch aborted");
                break;
            }
        }

        let mut progress = self.progress.lock();
        progress.in_progress = false;
        report.success = progress.success;
        report.doubt = progress.doubt;
        report.failed = progress.failed;
        tracing::debug!(
            success = report.success,
            doubt = report.doubt,
            failed = report.failed,
            errors = report.errors.len(),
            "Enrichment batch finished"
        );
        Ok(report)
    }
}
