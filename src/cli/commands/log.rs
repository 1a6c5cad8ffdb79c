use super::{AppContext, print_json};
use crate::errors::AppResult;
use crate::ui::messages::{header, info};
use crate::utils::formatting::pad_right;

pub async fn handle(ctx: &AppContext, print: bool, limit: usize) -> AppResult<()> {
    if !print {
        return Ok(());
    }

    let mut entries = ctx.store.audit_log(limit).await?;
    // oldest first on screen
    entries.reverse();

    if ctx.json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        info("Log is empty");
        return Ok(());
    }

    header("Internal log");
    let width = entries
        .iter()
        .map(|e| e.operation.len())
        .max()
        .unwrap_or(0)
        .min(24);
    for e in &entries {
        println!(
            "{} {} {} {}",
            pad_right(&e.date, 27),
            pad_right(&e.operation, width),
            pad_right(&e.target, 36),
            e.message
        );
    }
    Ok(())
}
