//! Best-effort search index maintenance after commit.
//!
//! Each delete and reindex call stands alone: a failure is logged, recorded
//! in the report and skipped. Nothing here touches the committed inventory.

use crate::model::record::RecordId;
use crate::search::index::{DocumentRef, SearchIndex};
use crate::transfer::record::IndexPlan;
use log::{debug, error};

/// One index call that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    Delete { document: DocumentRef, error: String },
    Reindex { bib_id: RecordId, error: String },
}

/// What one synchronization pass achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSyncReport {
    pub deleted: Vec<DocumentRef>,
    pub reindexed: Vec<RecordId>,
    pub failures: Vec<SyncFailure>,
}

impl IndexSyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct IndexSynchronizer<'a, I: SearchIndex + ?Sized> {
    index: &'a I,
}

impl<'a, I: SearchIndex + ?Sized> IndexSynchronizer<'a, I> {
    pub fn new(index: &'a I) -> Self {
        Self { index }
    }

    /// Deletes every planned document, then reindexes every planned bib.
    pub fn synchronize(&self, plan: &IndexPlan) -> IndexSyncReport {
        let mut report = IndexSyncReport::default();

        for document in &plan.to_delete {
            match self.index.delete_document(*document) {
                Ok(()) => report.deleted.push(*document),
                Err(err) => {
                    error!(
                        "event=index_sync module=transfer status=error op=delete doc_type={} record_id={} error={err}",
                        document.kind, document.record_id
                    );
                    report.failures.push(SyncFailure::Delete {
                        document: *document,
                        error: err.to_string(),
                    });
                }
            }
        }

        for bib_id in &plan.to_index {
            match self.index.reindex_by_bibliographic_id(*bib_id) {
                Ok(documents) => {
                    debug!(
                        "event=index_sync module=transfer status=ok op=reindex bib_id={bib_id} documents={documents}"
                    );
                    report.reindexed.push(*bib_id);
                }
                Err(err) => {
                    error!(
                        "event=index_sync module=transfer status=error op=reindex bib_id={bib_id} error={err}"
                    );
                    report.failures.push(SyncFailure::Reindex {
                        bib_id: *bib_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        report
    }
}
