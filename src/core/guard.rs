//! Referential integrity checks for child writes
//!
//! Every visit and treatment write walks the same stages:
//! `Received -> Validated -> ReferentialCheck -> Accepted -> Persisted`, or
//! ends in `Rejected` when the parent row is missing. The guard's probe is the
//! early exit; the store repeats the parent check inside its own write so a
//! parent deleted between probe and insert still yields a violation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{Result, VetClinicError};
use crate::storage::{with_deadline, CatStorage, EntityId, Repositories, VisitStorage};

/// Stage of a single child write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Received,
    Validated,
    ReferentialCheck,
    Accepted,
    Persisted,
    Rejected,
}

impl WriteStage {
    /// Legal forward transitions; `Persisted` and `Rejected` are terminal
    pub fn can_advance_to(self, next: WriteStage) -> bool {
        use WriteStage::*;
        matches!(
            (self, next),
            (Received, Validated)
                | (Received, Rejected)
                | (Validated, ReferentialCheck)
                | (ReferentialCheck, Accepted)
                | (ReferentialCheck, Rejected)
                | (Accepted, Persisted)
                | (Accepted, Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WriteStage::Persisted | WriteStage::Rejected)
    }
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteStage::Received => "received",
            WriteStage::Validated => "validated",
            WriteStage::ReferentialCheck => "referential_check",
            WriteStage::Accepted => "accepted",
            WriteStage::Persisted => "persisted",
            WriteStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Tracks one write through its stages and logs each transition
#[derive(Debug)]
pub struct WriteTrace {
    request_id: Uuid,
    entity: &'static str,
    stage: WriteStage,
}

impl WriteTrace {
    pub fn begin(request_id: Uuid, entity: &'static str) -> Self {
        log::debug!("[{}] {} write {}", request_id, entity, WriteStage::Received);
        Self {
            request_id,
            entity,
            stage: WriteStage::Received,
        }
    }

    pub fn stage(&self) -> WriteStage {
        self.stage
    }

    /// Moves to `next`; illegal transitions are logged and ignored
    pub fn advance(&mut self, next: WriteStage) {
        if !self.stage.can_advance_to(next) {
            log::error!(
                "[{}] {} write cannot move from {} to {}",
                self.request_id,
                self.entity,
                self.stage,
                next
            );
            return;
        }
        log::debug!("[{}] {} write {}", self.request_id, self.entity, next);
        self.stage = next;
    }

    /// Passes `result` through, ending the trace as `Rejected` on error
    pub fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if !self.stage.is_terminal() {
                log::info!(
                    "[{}] {} write rejected: {}",
                    self.request_id,
                    self.entity,
                    e.reason()
                );
                self.advance(WriteStage::Rejected);
            }
        }
        result
    }
}

/// Parent existence probes run before each child insert or update
#[derive(Clone)]
pub struct ReferentialGuard {
    cats: Arc<dyn CatStorage>,
    visits: Arc<dyn VisitStorage>,
    deadline: Duration,
}

impl ReferentialGuard {
    pub fn new(repositories: &Repositories, deadline: Duration) -> Self {
        Self {
            cats: repositories.cats.clone(),
            visits: repositories.visits.clone(),
            deadline,
        }
    }

    /// A visit may only reference an existing cat
    pub async fn ensure_cat_exists(&self, cat_id: EntityId) -> Result<()> {
        if with_deadline(self.deadline, self.cats.cat_exists(cat_id)).await? {
            Ok(())
        } else {
            Err(VetClinicError::ForeignKeyViolation {
                entity: "visit",
                parent: "cat",
                parent_id: cat_id,
            })
        }
    }

    /// A treatment may only reference an existing visit
    pub async fn ensure_visit_exists(&self, visit_id: EntityId) -> Result<()> {
        if with_deadline(self.deadline, self.visits.visit_exists(visit_id)).await? {
            Ok(())
        } else {
            Err(VetClinicError::ForeignKeyViolation {
                entity: "treatment",
                parent: "visit",
                parent_id: visit_id,
            })
        }
    }
}
