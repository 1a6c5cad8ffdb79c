//! Worked-time summaries over UTC calendar days.
//!
//! Only finished sessions count (`closed`, `auto_closed`, `corrected`); a
//! session belongs to the day of its `clock_in`.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;

use super::engine::LifecycleEngine;
use crate::errors::EngineResult;
use crate::models::{SessionStatus, UserId, WorkSession};
use crate::utils::date::{days_between, month_start, next_month_start, start_of_day, week_start};

/// Weekly averages are spread over a five-day working week.
const WORK_DAYS_PER_WEEK: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub worked_minutes: i64,
    pub break_minutes: i64,
    pub sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklySummary {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub days: Vec<DailySummary>,
    pub total_minutes: i64,
    pub average_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    pub month_start: NaiveDate,
    pub month_end: NaiveDate,
    pub total_minutes: i64,
    pub work_days: usize,
    pub average_minutes: i64,
    pub break_minutes: i64,
}

fn counts(s: &WorkSession) -> bool {
    matches!(
        s.status,
        SessionStatus::Closed | SessionStatus::AutoClosed | SessionStatus::Corrected
    )
}

pub fn summarize_day(date: NaiveDate, sessions: &[WorkSession]) -> DailySummary {
    let day: Vec<&WorkSession> = sessions
        .iter()
        .filter(|s| counts(s) && s.clock_in.date_naive() == date)
        .collect();

    DailySummary {
        date,
        worked_minutes: day.iter().filter_map(|s| s.total_work_minutes).sum(),
        break_minutes: day.iter().map(|s| s.total_break_minutes).sum(),
        sessions: day.len(),
    }
}

/// Monday to Sunday around `date`.
pub fn summarize_week(date: NaiveDate, sessions: &[WorkSession]) -> WeeklySummary {
    let start = week_start(date);
    let days: Vec<DailySummary> = days_between(start, start + Duration::days(7))
        .into_iter()
        .map(|d| summarize_day(d, sessions))
        .collect();
    let total: i64 = days.iter().map(|d| d.worked_minutes).sum();

    WeeklySummary {
        week_start: start,
        week_end: start + Duration::days(6),
        days,
        total_minutes: total,
        average_minutes: total / WORK_DAYS_PER_WEEK,
    }
}

pub fn summarize_month(date: NaiveDate, sessions: &[WorkSession]) -> MonthlySummary {
    let first = month_start(date);
    let next = next_month_start(date);
    let month: Vec<&WorkSession> = sessions
        .iter()
        .filter(|s| {
            let d = s.clock_in.date_naive();
            counts(s) && d >= first && d < next
        })
        .collect();

    let total: i64 = month.iter().filter_map(|s| s.total_work_minutes).sum();
    let work_days = month
        .iter()
        .map(|s| s.clock_in.date_naive())
        .collect::<BTreeSet<_>>()
        .len();

    MonthlySummary {
        month_start: first,
        month_end: next - Duration::days(1),
        total_minutes: total,
        work_days,
        average_minutes: if work_days > 0 {
            total / work_days as i64
        } else {
            0
        },
        break_minutes: month.iter().map(|s| s.total_break_minutes).sum(),
    }
}

pub async fn daily(
    engine: &LifecycleEngine,
    user: &UserId,
    date: NaiveDate,
) -> EngineResult<DailySummary> {
    let sessions = engine
        .sessions_between(user, start_of_day(date), start_of_day(date + Duration::days(1)))
        .await?;
    Ok(summarize_day(date, &sessions))
}

pub async fn weekly(
    engine: &LifecycleEngine,
    user: &UserId,
    date: NaiveDate,
) -> EngineResult<WeeklySummary> {
    let start = week_start(date);
    let sessions = engine
        .sessions_between(user, start_of_day(start), start_of_day(start + Duration::days(7)))
        .await?;
    Ok(summarize_week(date, &sessions))
}

pub async fn monthly(
    engine: &LifecycleEngine,
    user: &UserId,
    date: NaiveDate,
) -> EngineResult<MonthlySummary> {
    let sessions = engine
        .sessions_between(
            user,
            start_of_day(month_start(date)),
            start_of_day(next_month_start(date)),
        )
        .await?;
    Ok(summarize_month(date, &sessions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn closed(day: u32, work: i64, brk: i64) -> WorkSession {
        let clock_in = Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap();
        WorkSession {
            clock_out: Some(clock_in + Duration::minutes(work + brk)),
            status: SessionStatus::Closed,
            total_break_minutes: brk,
            total_work_minutes: Some(work),
            ..WorkSession::open(UserId::from("ana"), clock_in)
        }
    }

    #[test]
    fn open_sessions_do_not_count() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let open = WorkSession::open(UserId::from("ana"), start_of_day(d) + Duration::hours(8));
        let summary = summarize_day(d, &[closed(2, 450, 30), open]);
        assert_eq!(summary.worked_minutes, 450);
        assert_eq!(summary.sessions, 1);
    }

    #[test]
    fn week_average_is_over_five_days() {
        // 2026-03-02 is a Monday
        let sessions: Vec<_> = (2..=6).map(|d| closed(d, 480, 30)).collect();
        let week = summarize_week(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(), &sessions);
        assert_eq!(week.week_start, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(week.week_end, NaiveDate::from_ymd_opt(2026, 3, 8).unwrap());
        assert_eq!(week.days.len(), 7);
        assert_eq!(week.total_minutes, 2400);
        assert_eq!(week.average_minutes, 480);
    }

    #[test]
    fn month_counts_distinct_work_days() {
        let sessions = vec![closed(2, 240, 0), closed(2, 200, 10), closed(3, 400, 20)];
        let month = summarize_month(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(), &sessions);
        assert_eq!(month.work_days, 2);
        assert_eq!(month.total_minutes, 840);
        assert_eq!(month.average_minutes, 420);
        assert_eq!(month.break_minutes, 30);
        assert_eq!(month.month_end, NaiveDate::from_ymd_opt(2026, 3, 31).unwrap());
    }
}
