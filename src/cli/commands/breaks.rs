use super::{AppContext, parse_session_id, print_json};
use crate::cli::parser::BreakAction;
use crate::core::calculator::accumulated_break_minutes;
use crate::errors::{AppResult, EngineError};
use crate::models::SessionId;
use crate::ui::messages::{header, info, success};
use crate::utils::formatting::pad_right;
use crate::utils::mins2readable;
use crate::utils::time::floor_minutes;

async fn open_session_id(ctx: &AppContext) -> AppResult<SessionId> {
    let session = ctx
        .engine
        .get_open_session(&ctx.user)
        .await?
        .ok_or_else(|| EngineError::NotClockedIn(ctx.user.to_string()))?;
    Ok(session.id)
}

pub async fn handle(ctx: &AppContext, action: &BreakAction) -> AppResult<()> {
    let session_id = open_session_id(ctx).await?;

    match action {
        BreakAction::Start => {
            let record = ctx.engine.start_break(session_id).await?;
            if ctx.json {
                return print_json(&record);
            }
            success(format!(
                "Break started at {}",
                record.break_start.format("%H:%M:%S")
            ));
        }
        BreakAction::End => {
            let outcome = ctx.engine.end_break(session_id).await?;
            if ctx.json {
                return print_json(&outcome);
            }
            success(format!(
                "Break ended: {} credited, {} in this session",
                mins2readable(outcome.minutes, false, false),
                mins2readable(outcome.session.total_break_minutes, false, false)
            ));
        }
    }
    Ok(())
}

pub async fn list(ctx: &AppContext, session: &str) -> AppResult<()> {
    let session_id = parse_session_id(session)?;
    // fails with SessionNotFound for unknown ids
    ctx.engine.get_session(session_id).await?;
    let breaks = ctx.engine.list_session_breaks(session_id).await?;

    if ctx.json {
        return print_json(&breaks);
    }
    if breaks.is_empty() {
        info(format!("No breaks in session {}", session_id));
        return Ok(());
    }

    header(format!("Breaks of {}", session_id));
    for b in &breaks {
        let end = b
            .break_end
            .map(|e| e.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "running".into());
        let minutes = b
            .break_end
            .map(|e| mins2readable(floor_minutes(b.break_start, e), false, true))
            .unwrap_or_else(|| "-".into());
        println!(
            "{} {} {}",
            pad_right(&b.break_start.format("%Y-%m-%d %H:%M:%S").to_string(), 20),
            pad_right(&end, 9),
            minutes
        );
    }
    println!(
        "{} {}",
        pad_right("Total (closed)", 30),
        mins2readable(accumulated_break_minutes(&breaks), false, false)
    );
    Ok(())
}
