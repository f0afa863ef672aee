//! Record Repository View
//!
//! Owns the in-memory working set of records. The set is replaced wholesale
//! on every refresh from the ledger and handed out as clones only.

use log::{debug, warn};
use tokio::sync::RwLock;

use crate::ledger::{Ledger, LedgerError};
use crate::record::{Address, Record};

/// Dashboard figures over the working set
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryStats {
    pub total: usize,
    pub verified: usize,
    /// Mean of `public_attribute1`, 0.0 when empty
    pub average_experience: f64,
}

#[derive(Debug, Default)]
pub struct RecordRepository {
    records: RwLock<Vec<Record>>,
}

impl RecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload every record from the ledger.
    ///
    /// Records that fail to load are skipped. If the id listing itself
    /// fails, the previous snapshot is kept and the error returned.
    pub async fn refresh(&self, ledger: &dyn Ledger) -> Result<usize, LedgerError> {
        let ids = ledger.list_record_ids().await?;

        let mut loaded = Vec::with_capacity(ids.len());
        for id in &ids {
            match ledger.get_record(id).await {
                Ok(record) => loaded.push(record),
                Err(e) => warn!("Skipping record {}: {}", id, e),
            }
        }

        let count = loaded.len();
        *self.records.write().await = loaded;
        debug!("Repository refreshed: {} of {} records loaded", count, ids.len());
        Ok(count)
    }

    pub async fn records(&self) -> Vec<Record> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Record> {
        self.records
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    /// Records submitted by `owner`
    pub async fn owned_by(&self, owner: &Address) -> Vec<Record> {
        self.records
            .read()
            .await
            .iter()
            .filter(|record| record.is_owned_by(owner))
            .cloned()
            .collect()
    }

    pub async fn stats(&self) -> RepositoryStats {
        let records = self.records.read().await;
        let total = records.len();
        let verified = records.iter().filter(|record| record.verified()).count();
        let average_experience = if total == 0 {
            0.0
        } else {
            records
                .iter()
                .map(|record| f64::from(record.public_attribute1))
                .sum::<f64>()
                / total as f64
        };

        RepositoryStats {
            total,
            verified,
            average_experience,
        }
    }
}
