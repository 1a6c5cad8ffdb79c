use std::sync::Arc;
use std::time::Duration;

use super::{AppContext, print_json};
use crate::config::Config;
use crate::core::{ClockOutOutcome, SessionController, TimerMode};
use crate::errors::AppResult;
use crate::models::WorkSession;
use crate::ui::messages::{header, info, success, warning};
use crate::utils::formatting::{bold, pad_right};
use crate::utils::mins2readable;

fn short_ts(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub async fn clock_in(ctx: &AppContext) -> AppResult<()> {
    let session = ctx.engine.clock_in(&ctx.user).await?;

    if ctx.json {
        return print_json(&session);
    }
    success(format!(
        "{} clocked in at {} (session {})",
        ctx.user,
        short_ts(&session.clock_in),
        session.id
    ));
    Ok(())
}

pub async fn clock_out(ctx: &AppContext) -> AppResult<()> {
    let outcome = ctx.engine.clock_out(&ctx.user).await?;

    if ctx.json {
        return print_json(&outcome);
    }
    print_closed(&outcome);
    Ok(())
}

fn print_closed(outcome: &ClockOutOutcome) {
    let s = &outcome.session;
    if let Some(b) = &outcome.closed_break {
        info(format!("Running break since {} was ended", short_ts(&b.break_start)));
    }
    for w in &outcome.warnings {
        warning(w);
    }
    success(format!(
        "{} clocked out at {} | worked {} | breaks {}",
        s.user_id,
        s.clock_out.as_ref().map(short_ts).unwrap_or_default(),
        mins2readable(s.total_work_minutes.unwrap_or(0), false, false),
        mins2readable(s.total_break_minutes, false, false),
    ));
}

pub async fn status(ctx: &AppContext, watch: Option<u64>) -> AppResult<()> {
    let (mut controller, mut ticks) = SessionController::new(
        Arc::clone(&ctx.engine),
        ctx.user.clone(),
        ctx.cfg.tick_interval(),
    );
    controller.refresh().await?;

    if ctx.json {
        let (work, brk) = controller.display();
        let value = serde_json::json!({
            "user": ctx.user,
            "session": controller.session(),
            "active_break": controller.active_break(),
            "live": controller.live_mode(),
            "work": work,
            "break": brk,
        });
        controller.shutdown().await;
        return print_json(&value);
    }

    let Some(session) = controller.session().cloned() else {
        controller.shutdown().await;
        info(format!("{} is not clocked in", ctx.user));
        return Ok(());
    };

    let (work, brk) = controller.display();
    let live = controller.live_mode();
    header(format!("Status for {}", ctx.user));
    println!("{} {}", pad_right("Session", 10), session.id);
    println!("{} {}", pad_right("Clock-in", 10), short_ts(&session.clock_in));
    println!(
        "{} {}{}",
        pad_right("Work", 10),
        bold(&work),
        if live == Some(TimerMode::Work) { "  (running)" } else { "" }
    );
    println!(
        "{} {}{}",
        pad_right("Break", 10),
        bold(&brk),
        if live == Some(TimerMode::Break) { "  (running)" } else { "" }
    );

    if let Some(secs) = watch {
        let deadline = tokio::time::sleep(Duration::from_secs(secs));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                tick = ticks.recv() => match tick {
                    Some(t) => {
                        println!("{:>6} {}", format!("{:?}", t.mode).to_lowercase(), t.display)
                    }
                    None => break,
                },
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}

pub async fn history(ctx: &AppContext, limit: Option<usize>) -> AppResult<()> {
    let limit = limit.unwrap_or(ctx.cfg.history_limit);
    let sessions = ctx.engine.list_session_history(&ctx.user, limit).await?;

    if ctx.json {
        return print_json(&sessions);
    }
    if sessions.is_empty() {
        info(format!("No sessions for {}", ctx.user));
        return Ok(());
    }

    header(format!("Sessions of {}", ctx.user));
    println!(
        "{} {} {} {} {} {}",
        pad_right("ID", 36),
        pad_right("IN", 19),
        pad_right("OUT", 19),
        pad_right("STATUS", 11),
        pad_right("WORK", 8),
        "BREAKS"
    );
    for s in &sessions {
        print_row(s);
    }
    Ok(())
}

fn print_row(s: &WorkSession) {
    println!(
        "{} {} {} {} {} {}",
        pad_right(&s.id.to_string(), 36),
        pad_right(&short_ts(&s.clock_in), 19),
        pad_right(&s.clock_out.as_ref().map(short_ts).unwrap_or_else(|| "-".into()), 19),
        pad_right(s.status.label(), 11),
        pad_right(
            &s.total_work_minutes
                .map(|m| mins2readable(m, false, true))
                .unwrap_or_else(|| "-".into()),
            8
        ),
        mins2readable(s.total_break_minutes, false, true),
    );
}

pub async fn autoclose(ctx: &AppContext, hours: Option<i64>) -> AppResult<()> {
    let max_open = match hours {
        Some(h) => Config::auto_close_window(h)?,
        None => ctx.cfg.auto_close_after()?,
    };
    let closed = ctx.engine.auto_close_stale(max_open).await?;

    if ctx.json {
        return print_json(&closed);
    }
    if closed.is_empty() {
        info("No stale sessions");
        return Ok(());
    }
    for outcome in &closed {
        print_closed(outcome);
    }
    success(format!("{} session(s) auto-closed", closed.len()));
    Ok(())
}
