//! Correction-request approval workflow.
//!
//! A request is created `pending` and leaves that state exactly once. The
//! status change is a compare-and-set in the store (`expect: Pending`), so
//! of two concurrent reviews only the first lands; the other observes the
//! terminal status and fails with `InvalidStateTransition`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::engine::LifecycleEngine;
use crate::errors::{EngineError, EngineResult, EngineWarning, StoreError, Table};
use crate::models::{
    CorrectionId, CorrectionRequest, CorrectionStatus, SessionId, UserId, WorkSession,
};
use crate::store::{CorrectionFilter, CorrectionPatch, WriteOp};

/// Whose requests a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewScope {
    /// One requester's own requests.
    Own(UserId),
    /// Every request, for reviewers.
    All,
}

impl ReviewScope {
    fn filter(&self, status: Option<CorrectionStatus>) -> CorrectionFilter {
        CorrectionFilter {
            requested_by: match self {
                ReviewScope::Own(user) => Some(user.clone()),
                ReviewScope::All => None,
            },
            status,
            ..CorrectionFilter::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalOutcome {
    pub request: CorrectionRequest,
    pub session: WorkSession,
    pub warnings: Vec<EngineWarning>,
}

pub struct CorrectionWorkflow {
    engine: Arc<LifecycleEngine>,
    allow_self_review: bool,
}

impl CorrectionWorkflow {
    pub fn new(engine: Arc<LifecycleEngine>) -> Self {
        Self {
            engine,
            allow_self_review: false,
        }
    }

    /// Let requesters review their own requests.
    pub fn allow_self_review(mut self, allow: bool) -> Self {
        self.allow_self_review = allow;
        self
    }

    pub async fn submit(
        &self,
        requester: &UserId,
        session_id: SessionId,
        proposed_clock_in: DateTime<Utc>,
        proposed_clock_out: DateTime<Utc>,
        reason: &str,
    ) -> EngineResult<CorrectionRequest> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::EmptyReason);
        }
        if proposed_clock_out <= proposed_clock_in {
            return Err(EngineError::InvalidProposal(format!(
                "clock-out {} is not after clock-in {}",
                proposed_clock_out, proposed_clock_in
            )));
        }

        let session = self.engine.get_session(session_id).await?;
        let request = CorrectionRequest {
            id: CorrectionId::new(),
            session_id,
            requested_by: requester.clone(),
            proposed_clock_in,
            proposed_clock_out,
            original_clock_in: session.clock_in,
            original_clock_out: session.clock_out,
            reason: reason.to_string(),
            status: CorrectionStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            reviewer_comment: None,
            created_at: self.engine.now(),
        };

        match self
            .engine
            .commit(vec![WriteOp::InsertCorrection(request.clone())])
            .await?
        {
            Ok(()) => {
                tracing::info!(
                    correction = %request.id,
                    session = %session_id,
                    by = %requester,
                    "correction submitted"
                );
                Ok(request)
            }
            Err(StoreError::NotFound {
                table: Table::WorkSessions,
                ..
            }) => Err(EngineError::SessionNotFound(session_id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn approve(
        &self,
        reviewer: &UserId,
        id: CorrectionId,
        comment: Option<String>,
    ) -> EngineResult<ApprovalOutcome> {
        let request = self.reviewable(reviewer, id).await?;
        let patch = CorrectionPatch {
            status: CorrectionStatus::Approved,
            reviewed_by: reviewer.clone(),
            reviewed_at: self.engine.now(),
            reviewer_comment: comment,
        };
        let op = WriteOp::UpdateCorrection {
            id,
            expect: CorrectionStatus::Pending,
            patch: patch.clone(),
        };

        match self.engine.apply_correction(&request.effect(), vec![op]).await? {
            Ok(applied) => {
                let mut request = request;
                patch.apply_to(&mut request);
                tracing::info!(correction = %id, reviewer = %reviewer, "correction approved");
                Ok(ApprovalOutcome {
                    request,
                    session: applied.session,
                    warnings: applied.warnings,
                })
            }
            Err(e) => Err(self.review_failure(id, e).await),
        }
    }

    pub async fn reject(
        &self,
        reviewer: &UserId,
        id: CorrectionId,
        comment: Option<String>,
    ) -> EngineResult<CorrectionRequest> {
        let request = self.reviewable(reviewer, id).await?;
        let patch = CorrectionPatch {
            status: CorrectionStatus::Rejected,
            reviewed_by: reviewer.clone(),
            reviewed_at: self.engine.now(),
            reviewer_comment: comment,
        };
        let op = WriteOp::UpdateCorrection {
            id,
            expect: CorrectionStatus::Pending,
            patch: patch.clone(),
        };

        match self.engine.commit(vec![op]).await? {
            Ok(()) => {
                let mut request = request;
                patch.apply_to(&mut request);
                tracing::info!(correction = %id, reviewer = %reviewer, "correction rejected");
                Ok(request)
            }
            Err(e) => Err(self.review_failure(id, e).await),
        }
    }

    pub async fn get(&self, id: CorrectionId) -> EngineResult<CorrectionRequest> {
        self.engine
            .read(
                "find_correction",
                self.engine.store().find_correction(CorrectionFilter::by_id(id)),
            )
            .await?
            .ok_or(EngineError::CorrectionNotFound(id))
    }

    pub async fn list_pending(&self, scope: &ReviewScope) -> EngineResult<Vec<CorrectionRequest>> {
        self.list_by_status(Some(CorrectionStatus::Pending), scope)
            .await
    }

    /// Newest first. `None` lists every status.
    pub async fn list_by_status(
        &self,
        status: Option<CorrectionStatus>,
        scope: &ReviewScope,
    ) -> EngineResult<Vec<CorrectionRequest>> {
        self.engine
            .read(
                "find_corrections",
                self.engine.store().find_corrections(scope.filter(status), None),
            )
            .await
    }

    /// Load `id` and check the review preconditions, in order: pending,
    /// then not self-reviewed.
    async fn reviewable(
        &self,
        reviewer: &UserId,
        id: CorrectionId,
    ) -> EngineResult<CorrectionRequest> {
        let request = self.get(id).await?;
        if request.status.is_terminal() {
            return Err(EngineError::InvalidStateTransition {
                id,
                status: request.status.to_string(),
            });
        }
        if !self.allow_self_review && &request.requested_by == reviewer {
            return Err(EngineError::SelfReview(id));
        }
        Ok(request)
    }

    /// Classify a failed review batch. A failed `expect: Pending` guard
    /// means another reviewer got there first.
    async fn review_failure(&self, id: CorrectionId, err: StoreError) -> EngineError {
        match err {
            StoreError::PreconditionFailed {
                table: Table::CorrectionRequests,
                ..
            } => match self.get(id).await {
                Ok(current) => EngineError::InvalidStateTransition {
                    id,
                    status: current.status.to_string(),
                },
                Err(e) => e,
            },
            StoreError::NotFound {
                table: Table::CorrectionRequests,
                ..
            } => EngineError::CorrectionNotFound(id),
            other => other.into(),
        }
    }
}
