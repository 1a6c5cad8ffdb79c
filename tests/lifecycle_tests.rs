use chrono::Duration;

mod common;
use common::{at, harnesses, user, Harness};

use punchclock::errors::{EngineError, EngineWarning};
use punchclock::models::{SessionId, SessionStatus};

#[tokio::test]
async fn double_clock_in_is_rejected() {
    for (backend, h) in harnesses(at(9, 0, 0)) {
        let ana = user("ana");
        let session = h.engine.clock_in(&ana).await.unwrap();
        assert_eq!(session.status, SessionStatus::Open, "{backend}");
        assert_eq!(session.clock_in, at(9, 0, 0));

        let err = h.engine.clock_in(&ana).await.unwrap_err();
        assert_eq!(err, EngineError::AlreadyClockedIn("ana".into()), "{backend}");

        let open = h.engine.get_open_session(&ana).await.unwrap();
        assert_eq!(open.map(|s| s.id), Some(session.id), "{backend}");
    }
}

#[tokio::test]
async fn full_day_with_lunch_nets_450_minutes() {
    for (backend, h) in harnesses(at(9, 0, 0)) {
        let ana = user("ana");
        let session = h.engine.clock_in(&ana).await.unwrap();

        h.set(at(12, 0, 0));
        let brk = h.engine.start_break(session.id).await.unwrap();
        assert!(brk.is_active());

        h.set(at(12, 30, 0));
        let ended = h.engine.end_break(session.id).await.unwrap();
        assert_eq!(ended.minutes, 30, "{backend}");
        assert_eq!(ended.session.total_break_minutes, 30);

        h.set(at(17, 0, 0));
        let out = h.engine.clock_out(&ana).await.unwrap();
        assert_eq!(out.session.status, SessionStatus::Closed, "{backend}");
        assert_eq!(out.session.total_break_minutes, 30);
        assert_eq!(out.session.total_work_minutes, Some(450));
        assert!(out.closed_break.is_none());
        assert!(out.warnings.is_empty());

        // what the store holds agrees with what was returned
        let stored = h.engine.get_session(session.id).await.unwrap();
        assert_eq!(stored, out.session, "{backend}");
    }
}

#[tokio::test]
async fn clock_out_closes_running_break() {
    for (backend, h) in harnesses(at(9, 0, 0)) {
        let ana = user("ana");
        let session = h.engine.clock_in(&ana).await.unwrap();
        h.set(at(12, 0, 0));
        h.engine.start_break(session.id).await.unwrap();

        h.set(at(12, 10, 0));
        let out = h.engine.clock_out(&ana).await.unwrap();
        let closed = out.closed_break.expect("break closed with session");
        assert_eq!(closed.break_end, Some(at(12, 10, 0)), "{backend}");
        assert_eq!(out.session.total_break_minutes, 10);
        assert_eq!(out.session.total_work_minutes, Some(190 - 10));

        assert!(h.engine.get_active_break(session.id).await.unwrap().is_none());
        let breaks = h.engine.list_session_breaks(session.id).await.unwrap();
        assert_eq!(breaks.len(), 1);
        assert!(breaks.iter().all(|b| !b.is_active()), "{backend}");
    }
}

#[tokio::test]
async fn break_preconditions() {
    let h = Harness::memory(at(9, 0, 0));
    let ana = user("ana");

    let missing = SessionId::new();
    assert_eq!(
        h.engine.start_break(missing).await.unwrap_err(),
        EngineError::SessionNotFound(missing)
    );

    let session = h.engine.clock_in(&ana).await.unwrap();
    assert_eq!(
        h.engine.end_break(session.id).await.unwrap_err(),
        EngineError::NoActiveBreak(session.id)
    );

    h.engine.start_break(session.id).await.unwrap();
    assert_eq!(
        h.engine.start_break(session.id).await.unwrap_err(),
        EngineError::BreakAlreadyActive(session.id)
    );

    h.set(at(10, 0, 0));
    h.engine.clock_out(&ana).await.unwrap();
    assert_eq!(
        h.engine.start_break(session.id).await.unwrap_err(),
        EngineError::NoActiveSession(session.id)
    );
    assert_eq!(
        h.engine.clock_out(&ana).await.unwrap_err(),
        EngineError::NotClockedIn("ana".into())
    );
}

#[tokio::test]
async fn break_minutes_are_floored_per_break() {
    let h = Harness::sqlite(at(9, 0, 0));
    let session = h.engine.clock_in(&user("ana")).await.unwrap();

    for start in [at(10, 0, 0), at(11, 0, 0)] {
        h.set(start);
        h.engine.start_break(session.id).await.unwrap();
        h.set(start + Duration::seconds(179));
        let ended = h.engine.end_break(session.id).await.unwrap();
        assert_eq!(ended.minutes, 2);
    }

    let stored = h.engine.get_session(session.id).await.unwrap();
    assert_eq!(stored.total_break_minutes, 4);
}

#[tokio::test]
async fn history_is_newest_first_and_limited() {
    for (backend, h) in harnesses(at(6, 0, 0)) {
        let ana = user("ana");
        let mut ids = Vec::new();
        for hour in [7, 9, 11, 13] {
            h.set(at(hour, 0, 0));
            ids.push(h.engine.clock_in(&ana).await.unwrap().id);
            h.set(at(hour, 45, 0));
            h.engine.clock_out(&ana).await.unwrap();
        }
        h.engine.clock_in(&user("bob")).await.unwrap();

        let history = h.engine.list_session_history(&ana, 3).await.unwrap();
        let got: Vec<_> = history.iter().map(|s| s.id).collect();
        assert_eq!(got, vec![ids[3], ids[2], ids[1]], "{backend}");
        assert!(history.iter().all(|s| s.user_id == ana));
    }
}

#[tokio::test]
async fn breaks_of_a_session_are_oldest_first() {
    let h = Harness::memory(at(9, 0, 0));
    let session = h.engine.clock_in(&user("ana")).await.unwrap();
    for (start, end) in [((10, 0), (10, 5)), ((13, 0), (13, 20)), ((15, 0), (15, 1))] {
        h.set(at(start.0, start.1, 0));
        h.engine.start_break(session.id).await.unwrap();
        h.set(at(end.0, end.1, 0));
        h.engine.end_break(session.id).await.unwrap();
    }

    let breaks = h.engine.list_session_breaks(session.id).await.unwrap();
    let starts: Vec<_> = breaks.iter().map(|b| b.break_start).collect();
    assert_eq!(starts, vec![at(10, 0, 0), at(13, 0, 0), at(15, 0, 0)]);
    assert_eq!(h.engine.get_session(session.id).await.unwrap().total_break_minutes, 26);
}

#[tokio::test]
async fn stale_sessions_are_auto_closed() {
    for (backend, h) in harnesses(at(1, 0, 0)) {
        let ana = user("ana");
        let bob = user("bob");
        let stale = h.engine.clock_in(&ana).await.unwrap();
        h.set(at(2, 0, 0));
        h.engine.start_break(stale.id).await.unwrap();

        h.set(at(17, 0, 0));
        let fresh = h.engine.clock_in(&bob).await.unwrap();

        h.set(at(18, 0, 0));
        let closed = h.engine.auto_close_stale(Duration::hours(16)).await.unwrap();
        assert_eq!(closed.len(), 1, "{backend}");
        let outcome = &closed[0];
        assert_eq!(outcome.session.id, stale.id);
        assert_eq!(outcome.session.status, SessionStatus::AutoClosed);
        assert_eq!(outcome.session.total_break_minutes, 16 * 60);
        assert_eq!(outcome.session.total_work_minutes, Some(60));
        assert!(outcome.closed_break.is_some());

        // the user can start over
        h.engine.clock_in(&ana).await.unwrap();
        assert!(h.engine.get_session(fresh.id).await.unwrap().is_open());
    }
}

#[tokio::test]
async fn clock_out_before_clock_in_is_clamped_to_zero() {
    for (backend, h) in harnesses(at(9, 0, 0)) {
        let ana = user("ana");
        let session = h.engine.clock_in(&ana).await.unwrap();

        // clock stepped back an hour
        h.set(at(8, 0, 0));
        let out = h.engine.clock_out(&ana).await.unwrap();

        assert_eq!(out.session.status, SessionStatus::Closed, "{backend}");
        assert_eq!(out.session.total_work_minutes, Some(0), "{backend}");
        assert_eq!(
            out.warnings,
            vec![EngineWarning::NegativeDurationClamped {
                session: session.id,
                raw_minutes: -60
            }],
            "{backend}"
        );
        let stored = h.engine.get_session(session.id).await.unwrap();
        assert_eq!(stored, out.session, "{backend}");
    }
}

#[tokio::test]
async fn oversized_auto_close_threshold_is_an_error() {
    for (backend, h) in harnesses(at(9, 0, 0)) {
        let ana = user("ana");
        h.engine.clock_in(&ana).await.unwrap();

        let huge = Duration::try_days(1_000_000_000).unwrap();
        let err = h.engine.auto_close_stale(huge).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidProposal(_)), "{backend}: {err:?}");
        assert!(h.engine.get_open_session(&ana).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn system_clock_records_match_what_is_stored() {
    use punchclock::core::{EngineSettings, LifecycleEngine, SystemClock};
    use punchclock::store::SqliteStore;
    use std::sync::Arc;

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let engine =
        LifecycleEngine::new(store, Arc::new(SystemClock::new()), EngineSettings::default());
    let ana = user("ana");

    let opened = engine.clock_in(&ana).await.unwrap();
    assert_eq!(engine.get_session(opened.id).await.unwrap(), opened);

    let brk = engine.start_break(opened.id).await.unwrap();
    assert_eq!(engine.get_active_break(opened.id).await.unwrap(), Some(brk));

    let out = engine.clock_out(&ana).await.unwrap();
    assert_eq!(engine.get_session(opened.id).await.unwrap(), out.session);
    let breaks = engine.list_session_breaks(opened.id).await.unwrap();
    assert_eq!(breaks, out.closed_break.into_iter().collect::<Vec<_>>());
}

#[tokio::test]
async fn slow_store_reports_unavailable() {
    use punchclock::store::MemoryStore;
    use std::sync::Arc;

    let store = Arc::new(MemoryStore::with_latency(std::time::Duration::from_millis(500)));
    let h = Harness::with_settings(store, at(9, 0, 0), common::short_timeout());

    let err = h.engine.clock_in(&user("ana")).await.unwrap_err();
    assert!(matches!(err, EngineError::StoreUnavailable(_)), "{err:?}");
    assert!(!err.is_precondition());
}
