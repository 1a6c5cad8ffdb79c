use super::{AppContext, parse_correction_id, parse_session_id, print_json};
use crate::cli::parser::CorrectionAction;
use crate::core::ReviewScope;
use crate::errors::{AppError, AppResult};
use crate::models::{CorrectionRequest, CorrectionStatus};
use crate::ui::messages::{header, info, success, warning};
use crate::utils::formatting::pad_right;
use crate::utils::time::parse_instant;

pub async fn handle(ctx: &AppContext, action: &CorrectionAction) -> AppResult<()> {
    match action {
        CorrectionAction::Submit {
            session,
            clock_in,
            clock_out,
            reason,
        } => {
            let session_id = parse_session_id(session)?;
            let proposed_in = parse_instant(clock_in)?;
            let proposed_out = parse_instant(clock_out)?;

            let request = ctx
                .workflow
                .submit(&ctx.user, session_id, proposed_in, proposed_out, reason)
                .await?;
            if ctx.json {
                return print_json(&request);
            }
            success(format!("Correction {} submitted (pending)", request.id));
        }

        CorrectionAction::Approve { id, comment } => {
            let id = parse_correction_id(id)?;
            let outcome = ctx.workflow.approve(&ctx.user, id, comment.clone()).await?;
            if ctx.json {
                return print_json(&outcome);
            }
            for w in &outcome.warnings {
                warning(w);
            }
            success(format!(
                "Correction {} approved; session {} is now {}",
                id, outcome.session.id, outcome.session.status
            ));
        }

        CorrectionAction::Reject { id, comment } => {
            let id = parse_correction_id(id)?;
            let request = ctx.workflow.reject(&ctx.user, id, comment.clone()).await?;
            if ctx.json {
                return print_json(&request);
            }
            success(format!("Correction {} rejected", request.id));
        }

        CorrectionAction::List { status, all } => {
            let status = status
                .as_deref()
                .map(|s| {
                    CorrectionStatus::from_code(s)
                        .ok_or_else(|| AppError::Other(format!("unknown correction status: {}", s)))
                })
                .transpose()?;
            let scope = if *all {
                ReviewScope::All
            } else {
                ReviewScope::Own(ctx.user.clone())
            };

            let requests = ctx.workflow.list_by_status(status, &scope).await?;
            if ctx.json {
                return print_json(&requests);
            }
            if requests.is_empty() {
                info("No correction requests");
                return Ok(());
            }
            header("Correction requests");
            for r in &requests {
                print_request(r);
            }
        }
    }
    Ok(())
}

fn print_request(r: &CorrectionRequest) {
    let fmt = |t: &chrono::DateTime<chrono::Utc>| t.format("%Y-%m-%d %H:%M").to_string();
    println!(
        "{} {} {} {} → {}  {}",
        pad_right(&r.id.to_string(), 36),
        pad_right(r.status.to_db_str(), 8),
        pad_right(r.requested_by.as_str(), 12),
        fmt(&r.proposed_clock_in),
        fmt(&r.proposed_clock_out),
        r.reason
    );
}
