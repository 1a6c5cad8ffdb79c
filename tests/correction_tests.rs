use std::sync::Arc;

mod common;
use common::{at, harnesses, user, Harness};

use punchclock::core::{CorrectionWorkflow, ReviewScope};
use punchclock::errors::{EngineError, EngineWarning};
use punchclock::models::{CorrectionId, CorrectionStatus, SessionId, SessionStatus, WorkSession};

/// A closed 09:00 to 17:00 session of `ana` with a 30 minute break.
async fn closed_day(h: &Harness) -> WorkSession {
    let ana = user("ana");
    h.set(at(9, 0, 0));
    let s = h.engine.clock_in(&ana).await.unwrap();
    h.set(at(12, 0, 0));
    h.engine.start_break(s.id).await.unwrap();
    h.set(at(12, 30, 0));
    h.engine.end_break(s.id).await.unwrap();
    h.set(at(17, 0, 0));
    h.engine.clock_out(&ana).await.unwrap().session
}

#[tokio::test]
async fn blank_reason_creates_nothing() {
    let h = Harness::memory(at(9, 0, 0));
    let session = closed_day(&h).await;
    let wf = h.workflow();

    for reason in ["", "   \t"] {
        let err = wf
            .submit(&user("ana"), session.id, at(8, 0, 0), at(17, 0, 0), reason)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::EmptyReason);
    }
    let all = wf.list_by_status(None, &ReviewScope::All).await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn submit_snapshots_original_times() {
    for (backend, h) in harnesses(at(9, 0, 0)) {
        let session = closed_day(&h).await;
        let req = h
            .workflow()
            .submit(&user("ana"), session.id, at(8, 45, 0), at(17, 0, 0), "  train delay  ")
            .await
            .unwrap();

        assert_eq!(req.status, CorrectionStatus::Pending, "{backend}");
        assert_eq!(req.original_clock_in, at(9, 0, 0));
        assert_eq!(req.original_clock_out, Some(at(17, 0, 0)));
        assert_eq!(req.reason, "train delay");
        assert!(req.reviewed_by.is_none() && req.reviewed_at.is_none());

        let stored = h.workflow().get(req.id).await.unwrap();
        assert_eq!(stored, req, "{backend}");
    }
}

#[tokio::test]
async fn submit_validates_session_and_times() {
    let h = Harness::memory(at(9, 0, 0));
    let session = closed_day(&h).await;
    let wf = h.workflow();

    let missing = SessionId::new();
    assert_eq!(
        wf.submit(&user("ana"), missing, at(8, 0, 0), at(17, 0, 0), "x")
            .await
            .unwrap_err(),
        EngineError::SessionNotFound(missing)
    );
    assert!(matches!(
        wf.submit(&user("ana"), session.id, at(17, 0, 0), at(8, 0, 0), "swapped")
            .await
            .unwrap_err(),
        EngineError::InvalidProposal(_)
    ));
}

#[tokio::test]
async fn approval_overwrites_session_times() {
    for (backend, h) in harnesses(at(9, 0, 0)) {
        let session = closed_day(&h).await;
        let wf = h.workflow();
        let req = wf
            .submit(&user("ana"), session.id, at(8, 0, 0), at(17, 30, 0), "forgot to clock in")
            .await
            .unwrap();

        h.set(at(18, 0, 0));
        let outcome = wf
            .approve(&user("lead"), req.id, Some("ok".into()))
            .await
            .unwrap();

        assert_eq!(outcome.request.status, CorrectionStatus::Approved, "{backend}");
        assert_eq!(outcome.request.reviewed_by, Some(user("lead")));
        assert_eq!(outcome.request.reviewed_at, Some(at(18, 0, 0)));
        assert_eq!(outcome.request.reviewer_comment.as_deref(), Some("ok"));

        let stored = h.engine.get_session(session.id).await.unwrap();
        assert_eq!(stored.status, SessionStatus::Corrected, "{backend}");
        assert_eq!(stored.clock_in, at(8, 0, 0));
        assert_eq!(stored.clock_out, Some(at(17, 30, 0)));
        // 570 minutes on site, 30 on break
        assert_eq!(stored.total_work_minutes, Some(540));
        assert_eq!(stored.total_break_minutes, 30);

        assert_eq!(wf.get(req.id).await.unwrap(), outcome.request, "{backend}");
    }
}

#[tokio::test]
async fn approve_after_reject_leaves_session_alone() {
    for (backend, h) in harnesses(at(9, 0, 0)) {
        let session = closed_day(&h).await;
        let wf = h.workflow();
        let req = wf
            .submit(&user("ana"), session.id, at(8, 0, 0), at(17, 0, 0), "early start")
            .await
            .unwrap();

        let rejected = wf.reject(&user("lead"), req.id, Some("no".into())).await.unwrap();
        assert_eq!(rejected.status, CorrectionStatus::Rejected, "{backend}");

        let err = wf.approve(&user("lead"), req.id, None).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidStateTransition {
                id: req.id,
                status: "rejected".into()
            },
            "{backend}"
        );
        assert!(matches!(
            wf.reject(&user("boss"), req.id, None).await.unwrap_err(),
            EngineError::InvalidStateTransition { .. }
        ));

        let stored = h.engine.get_session(session.id).await.unwrap();
        assert_eq!(stored, session, "{backend}");
    }
}

#[tokio::test]
async fn self_review_is_refused_unless_allowed() {
    let h = Harness::memory(at(9, 0, 0));
    let session = closed_day(&h).await;
    let wf = h.workflow();
    let req = wf
        .submit(&user("ana"), session.id, at(8, 0, 0), at(17, 0, 0), "early start")
        .await
        .unwrap();

    assert_eq!(
        wf.approve(&user("ana"), req.id, None).await.unwrap_err(),
        EngineError::SelfReview(req.id)
    );
    assert_eq!(
        wf.reject(&user("ana"), req.id, None).await.unwrap_err(),
        EngineError::SelfReview(req.id)
    );
    assert_eq!(wf.get(req.id).await.unwrap().status, CorrectionStatus::Pending);

    let lenient = CorrectionWorkflow::new(Arc::clone(&h.engine)).allow_self_review(true);
    let outcome = lenient.approve(&user("ana"), req.id, None).await.unwrap();
    assert_eq!(outcome.session.status, SessionStatus::Corrected);
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let h = Harness::memory(at(9, 0, 0));
    let id = CorrectionId::new();
    assert_eq!(
        h.workflow().approve(&user("lead"), id, None).await.unwrap_err(),
        EngineError::CorrectionNotFound(id)
    );
}

#[tokio::test]
async fn correction_shorter_than_breaks_is_clamped() {
    let h = Harness::sqlite(at(9, 0, 0));
    let session = closed_day(&h).await;
    let wf = h.workflow();
    let req = wf
        .submit(&user("ana"), session.id, at(9, 0, 0), at(9, 10, 0), "only came in briefly")
        .await
        .unwrap();

    let outcome = wf.approve(&user("lead"), req.id, None).await.unwrap();
    assert_eq!(outcome.session.total_work_minutes, Some(0));
    assert_eq!(
        outcome.warnings,
        vec![EngineWarning::NegativeDurationClamped {
            session: session.id,
            raw_minutes: -20
        }]
    );
}

#[tokio::test]
async fn listings_respect_scope_and_status() {
    for (backend, h) in harnesses(at(9, 0, 0)) {
        let session = closed_day(&h).await;
        h.set(at(18, 0, 0));
        let bob = user("bob");
        let bob_session = h.engine.clock_in(&bob).await.unwrap();
        let wf = h.workflow();

        let a1 = wf
            .submit(&user("ana"), session.id, at(8, 0, 0), at(17, 0, 0), "first")
            .await
            .unwrap();
        h.set(at(18, 1, 0));
        let a2 = wf
            .submit(&user("ana"), session.id, at(8, 30, 0), at(17, 0, 0), "second")
            .await
            .unwrap();
        h.set(at(18, 2, 0));
        let b1 = wf
            .submit(&bob, bob_session.id, at(17, 0, 0), at(19, 0, 0), "bob")
            .await
            .unwrap();
        wf.reject(&user("lead"), a1.id, None).await.unwrap();

        let ids = |v: Vec<punchclock::models::CorrectionRequest>| {
            v.into_iter().map(|r| r.id).collect::<Vec<_>>()
        };

        let pending_all = ids(wf.list_pending(&ReviewScope::All).await.unwrap());
        assert_eq!(pending_all, vec![b1.id, a2.id], "{backend}");

        let ana_all = ids(
            wf.list_by_status(None, &ReviewScope::Own(user("ana")))
                .await
                .unwrap(),
        );
        assert_eq!(ana_all, vec![a2.id, a1.id], "{backend}");

        let rejected = ids(
            wf.list_by_status(Some(CorrectionStatus::Rejected), &ReviewScope::All)
                .await
                .unwrap(),
        );
        assert_eq!(rejected, vec![a1.id], "{backend}");
    }
}
