//! Batched persistence with per-record fallback

use crate::metrics;
use crate::models::NewDomainRecord;
use crate::storage::repository::SharedRepository;

/// Persists admitted records in one bulk operation per page
///
/// When the bulk write fails the batch is retried record by record, so one
/// bad row never costs the whole page. Individual failures are logged and
/// skipped.
#[derive(Clone)]
pub struct BatchWriter {
    repo: SharedRepository,
}

impl BatchWriter {
    pub fn new(repo: SharedRepository) -> Self {
        Self { repo }
    }

    /// Write a batch and return how many rows were newly inserted
    ///
    /// Rows that already exist are ignored, so repeating a batch returns 0.
    pub fn write(&self, records: &[NewDomainRecord]) -> u64 {
        if records.is_empty() {
            return 0;
        }

        match self.repo.insert_domains(records) {
            Ok(inserted) => {
                metrics::record_inserted(inserted as u64);
                inserted as u64
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    batch = records.len(),
                    "Bulk insert failed, falling back to per-record inserts"
                );
                metrics::record_bulk_fallback();
                self.write_individually(records)
            }
        }
    }

    fn write_individually(&self, records: &[NewDomainRecord]) -> u64 {
        let mut inserted = 0u64;
        for record in records {
            match self.repo.insert_domain(record) {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(e) => {
                    metrics::record_insert_failure();
                    tracing::warn!(
                        error = %e,
                        domain = %record.domain,
                        "Failed to insert record, skipping"
                    );
                }
            }
        }
        metrics::record_inserted(inserted);
        inserted
    }
}
