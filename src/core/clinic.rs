//! Cat, visit and treatment operations
//!
//! Handlers pass raw request payloads in; this service validates them, runs
//! the referential guard for child writes and then calls the repositories
//! under the configured deadline.

use std::time::Duration;

use crate::auth::RequestContext;
use crate::core::guard::{ReferentialGuard, WriteStage, WriteTrace};
use crate::core::payload::{CatRequest, TreatmentRequest, VisitQuery, VisitRequest};
use crate::error::Result;
use crate::storage::{
    with_deadline, CascadeSummary, Cat, CatHistory, EntityId, Repositories, Treatment,
    VisitRecord,
};

/// Record-keeping operations over the cat, visit and treatment tables
pub struct ClinicService {
    repositories: Repositories,
    guard: ReferentialGuard,
    deadline: Duration,
}

impl ClinicService {
    pub fn new(repositories: Repositories, deadline: Duration) -> Self {
        let guard = ReferentialGuard::new(&repositories, deadline);
        Self {
            repositories,
            guard,
            deadline,
        }
    }

    // Cats

    pub async fn create_cat(&self, ctx: &RequestContext, request: CatRequest) -> Result<Cat> {
        let cat = request.validate()?;
        let created = with_deadline(self.deadline, self.repositories.cats.create_cat(cat)).await?;
        log::info!("[{}] {} created cat {}", ctx.request_id, ctx.email, created.id);
        Ok(created)
    }

    pub async fn list_cats(&self) -> Result<Vec<Cat>> {
        with_deadline(self.deadline, self.repositories.cats.list_cats()).await
    }

    pub async fn get_cat(&self, id: EntityId) -> Result<Cat> {
        with_deadline(self.deadline, self.repositories.cats.get_cat(id)).await
    }

    pub async fn cat_history(&self, id: EntityId) -> Result<CatHistory> {
        with_deadline(self.deadline, self.repositories.cats.get_cat_history(id)).await
    }

    pub async fn update_cat(
        &self,
        ctx: &RequestContext,
        id: EntityId,
        request: CatRequest,
    ) -> Result<Cat> {
        let cat = request.validate()?;
        let updated =
            with_deadline(self.deadline, self.repositories.cats.update_cat(id, cat)).await?;
        log::info!("[{}] {} updated cat {}", ctx.request_id, ctx.email, id);
        Ok(updated)
    }

    /// Removes the cat together with its visits and their treatments
    pub async fn delete_cat(&self, ctx: &RequestContext, id: EntityId) -> Result<CascadeSummary> {
        let summary = with_deadline(self.deadline, self.repositories.cats.delete_cat(id)).await?;
        log::info!(
            "[{}] {} deleted cat {} ({} visits, {} treatments)",
            ctx.request_id,
            ctx.email,
            id,
            summary.visits_removed,
            summary.treatments_removed
        );
        Ok(summary)
    }

    // Visits

    pub async fn create_visit(
        &self,
        ctx: &RequestContext,
        request: VisitRequest,
    ) -> Result<VisitRecord> {
        let mut trace = WriteTrace::begin(ctx.request_id, "visit");
        let visit = trace.settle(request.validate())?;
        trace.advance(WriteStage::Validated);

        trace.advance(WriteStage::ReferentialCheck);
        trace.settle(self.guard.ensure_cat_exists(visit.cat_id).await)?;
        trace.advance(WriteStage::Accepted);

        let created = trace.settle(
            with_deadline(self.deadline, self.repositories.visits.create_visit(visit)).await,
        )?;
        trace.advance(WriteStage::Persisted);
        log::info!(
            "[{}] {} created visit {} for cat {}",
            ctx.request_id,
            ctx.email,
            created.visit.id,
            created.visit.cat_id
        );
        Ok(created)
    }

    /// Lists visits matching the first non-empty query filter
    pub async fn list_visits(&self, query: VisitQuery) -> Result<Vec<VisitRecord>> {
        let filter = query.into_filter()?;
        log::debug!("Listing visits with filter {:?}", filter);
        with_deadline(self.deadline, self.repositories.visits.find_visits(&filter)).await
    }

    pub async fn get_visit(&self, id: EntityId) -> Result<VisitRecord> {
        with_deadline(self.deadline, self.repositories.visits.get_visit(id)).await
    }

    pub async fn update_visit(
        &self,
        ctx: &RequestContext,
        id: EntityId,
        request: VisitRequest,
    ) -> Result<VisitRecord> {
        let mut trace = WriteTrace::begin(ctx.request_id, "visit");
        let visit = trace.settle(request.validate())?;
        trace.advance(WriteStage::Validated);

        trace.advance(WriteStage::ReferentialCheck);
        trace.settle(self.guard.ensure_cat_exists(visit.cat_id).await)?;
        trace.advance(WriteStage::Accepted);

        let updated = trace.settle(
            with_deadline(self.deadline, self.repositories.visits.update_visit(id, visit)).await,
        )?;
        trace.advance(WriteStage::Persisted);
        log::info!("[{}] {} updated visit {}", ctx.request_id, ctx.email, id);
        Ok(updated)
    }

    /// Removes the visit together with its treatments
    pub async fn delete_visit(
        &self,
        ctx: &RequestContext,
        id: EntityId,
    ) -> Result<CascadeSummary> {
        let summary =
            with_deadline(self.deadline, self.repositories.visits.delete_visit(id)).await?;
        log::info!(
            "[{}] {} deleted visit {} ({} treatments)",
            ctx.request_id,
            ctx.email,
            id,
            summary.treatments_removed
        );
        Ok(summary)
    }

    // Treatments

    pub async fn create_treatment(
        &self,
        ctx: &RequestContext,
        request: TreatmentRequest,
    ) -> Result<Treatment> {
        let mut trace = WriteTrace::begin(ctx.request_id, "treatment");
        let treatment = trace.settle(request.validate())?;
        trace.advance(WriteStage::Validated);

        trace.advance(WriteStage::ReferentialCheck);
        trace.settle(self.guard.ensure_visit_exists(treatment.visit_id).await)?;
        trace.advance(WriteStage::Accepted);

        let created = trace.settle(
            with_deadline(
                self.deadline,
                self.repositories.treatments.create_treatment(treatment),
            )
            .await,
        )?;
        trace.advance(WriteStage::Persisted);
        log::info!(
            "[{}] {} created treatment {} for visit {}",
            ctx.request_id,
            ctx.email,
            created.id,
            created.visit_id
        );
        Ok(created)
    }

    pub async fn list_treatments(&self) -> Result<Vec<Treatment>> {
        with_deadline(self.deadline, self.repositories.treatments.list_treatments()).await
    }

    pub async fn get_treatment(&self, id: EntityId) -> Result<Treatment> {
        with_deadline(self.deadline, self.repositories.treatments.get_treatment(id)).await
    }

    /// Treatments administered during one visit; empty for an unknown visit
    pub async fn visit_treatments(&self, visit_id: EntityId) -> Result<Vec<Treatment>> {
        with_deadline(
            self.deadline,
            self.repositories.treatments.list_visit_treatments(visit_id),
        )
        .await
    }

    pub async fn update_treatment(
        &self,
        ctx: &RequestContext,
        id: EntityId,
        request: TreatmentRequest,
    ) -> Result<Treatment> {
        let mut trace = WriteTrace::begin(ctx.request_id, "treatment");
        let treatment = trace.settle(request.validate())?;
        trace.advance(WriteStage::Validated);

        trace.advance(WriteStage::ReferentialCheck);
        trace.settle(self.guard.ensure_visit_exists(treatment.visit_id).await)?;
        trace.advance(WriteStage::Accepted);

        let updated = trace.settle(
            with_deadline(
                self.deadline,
                self.repositories.treatments.update_treatment(id, treatment),
            )
            .await,
        )?;
        trace.advance(WriteStage::Persisted);
        log::info!("[{}] {} updated treatment {}", ctx.request_id, ctx.email, id);
        Ok(updated)
    }

    pub async fn delete_treatment(&self, ctx: &RequestContext, id: EntityId) -> Result<()> {
        with_deadline(self.deadline, self.repositories.treatments.delete_treatment(id)).await?;
        log::info!("[{}] {} deleted treatment {}", ctx.request_id, ctx.email, id);
        Ok(())
    }
}
