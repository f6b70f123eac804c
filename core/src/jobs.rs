//! Client-side registry of submitted verification jobs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};
use verifier_gateway::GatewayError;
use verifier_types::{JobId, JobRecord, JobStatus, UploadFile};

use crate::SessionManager;

#[derive(Debug, Default)]
struct JobBook {
    epoch: u64,
    /// Most recent first.
    records: Vec<JobRecord>,
}

impl JobBook {
    /// Drop records that belong to an ended session.
    fn sync(&mut self, epoch: u64) {
        if self.epoch != epoch {
            if !self.records.is_empty() {
                debug!(dropped = self.records.len(), "Session changed; clearing job list");
            }
            self.records.clear();
            self.epoch = epoch;
        }
    }

    fn find_mut(&mut self, id: &JobId) -> Option<&mut JobRecord> {
        self.records.iter_mut().find(|record| &record.id == id)
    }
}

/// Jobs submitted during the current session, most recent first.
///
/// Records are inserted when their submission resolves and are never reconciled against a
/// server-side listing.
#[derive(Debug)]
pub struct JobRegistry {
    session: Arc<SessionManager>,
    book: Mutex<JobBook>,
}

impl JobRegistry {
    #[must_use]
    pub fn new(session: Arc<SessionManager>) -> Self {
        let epoch = session.epoch();
        Self {
            session,
            book: Mutex::new(JobBook {
                epoch,
                records: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobBook> {
        let mut book = self.book.lock().unwrap_or_else(PoisonError::into_inner);
        book.sync(self.session.epoch());
        book
    }

    /// Upload `file` (or simulate it) and record the resulting job.
    ///
    /// A failure leaves the registry untouched.
    pub async fn submit(&self, file: UploadFile) -> Result<JobRecord, GatewayError> {
        let epoch = self.session.epoch();
        let fallback = self.session.fallback();

        let id = if fallback.is_simulated() {
            fallback.delay().await;
            JobId::simulated()
        } else {
            self.session.gateway().upload(&file).await?.job_id
        };

        let record = JobRecord::queued(id, file.filename(), Utc::now());
        let mut book = self.lock();
        if book.epoch == epoch {
            book.records.insert(0, record.clone());
            info!(job_id = %record.id, filename = %record.filename, "Job submitted");
        } else {
            warn!(job_id = %record.id, "Submission resolved after its session ended; not recorded");
        }
        Ok(record)
    }

    /// Snapshot, most recent first.
    #[must_use]
    pub fn list(&self) -> Vec<JobRecord> {
        self.lock().records.clone()
    }

    #[must_use]
    pub fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.lock().records.iter().find(|r| &r.id == id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Update one record's status and progress. `Ok(None)` if the id is not tracked.
    pub async fn refresh(&self, id: &JobId) -> Result<Option<JobRecord>, GatewayError> {
        let epoch = {
            let book = self.lock();
            if !book.records.iter().any(|r| &r.id == id) {
                return Ok(None);
            }
            book.epoch
        };

        let fallback = self.session.fallback();
        if fallback.is_simulated() {
            fallback.delay().await;
            let mut book = self.lock();
            if book.epoch != epoch {
                return Ok(None);
            }
            return Ok(book.find_mut(id).map(|record| {
                advance_simulated(record);
                record.clone()
            }));
        }

        let report = self.session.gateway().job_status(id).await?;
        let mut book = self.lock();
        if book.epoch != epoch {
            debug!(job_id = %id, "Status arrived after session ended; dropping");
            return Ok(None);
        }
        Ok(book.find_mut(id).map(|record| {
            record.status = report.status;
            record.progress = report.progress;
            debug!(job_id = %record.id, status = %record.status, progress = %record.progress, "Job refreshed");
            record.clone()
        }))
    }
}

fn advance_simulated(record: &mut JobRecord) {
    let (status, progress) = match record.status {
        JobStatus::Queued => (JobStatus::Processing, "50%"),
        JobStatus::Processing | JobStatus::Completed => (JobStatus::Completed, "100%"),
        JobStatus::Failed => return,
    };
    record.status = status;
    record.progress = progress.to_string();
}
