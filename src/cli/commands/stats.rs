use super::{AppContext, print_json};
use crate::cli::parser::StatsPeriod;
use crate::core::stats;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::header;
use crate::utils::date::{parse_date, today};
use crate::utils::formatting::pad_right;
use crate::utils::mins2readable;

pub async fn handle(ctx: &AppContext, period: StatsPeriod, date: Option<&str>) -> AppResult<()> {
    let date = match date {
        Some(raw) => parse_date(raw).ok_or_else(|| AppError::InvalidDate(raw.to_string()))?,
        None => today(),
    };
    let engine = ctx.engine.as_ref();

    match period {
        StatsPeriod::Day => {
            let day = stats::daily(engine, &ctx.user, date).await?;
            if ctx.json {
                return print_json(&day);
            }
            header(format!("{} on {}", ctx.user, day.date));
            println!(
                "{} {}",
                pad_right("Worked", 9),
                mins2readable(day.worked_minutes, false, false)
            );
            println!(
                "{} {}",
                pad_right("Breaks", 9),
                mins2readable(day.break_minutes, false, false)
            );
            println!("{} {}", pad_right("Sessions", 9), day.sessions);
        }
        StatsPeriod::Week => {
            let week = stats::weekly(engine, &ctx.user, date).await?;
            if ctx.json {
                return print_json(&week);
            }
            header(format!("{} from {} to {}", ctx.user, week.week_start, week.week_end));
            for d in &week.days {
                println!(
                    "{} {} {}",
                    pad_right(&d.date.format("%a %Y-%m-%d").to_string(), 15),
                    mins2readable(d.worked_minutes, false, true),
                    mins2readable(d.break_minutes, false, true)
                );
            }
            println!(
                "{} {}",
                pad_right("Total", 15),
                mins2readable(week.total_minutes, false, false)
            );
            println!(
                "{} {}",
                pad_right("Average", 15),
                mins2readable(week.average_minutes, false, false)
            );
        }
        StatsPeriod::Month => {
            let month = stats::monthly(engine, &ctx.user, date).await?;
            if ctx.json {
                return print_json(&month);
            }
            header(format!("{} in {}", ctx.user, month.month_start.format("%B %Y")));
            println!(
                "{} {}",
                pad_right("Worked", 10),
                mins2readable(month.total_minutes, false, false)
            );
            println!("{} {}", pad_right("Work days", 10), month.work_days);
            println!(
                "{} {}",
                pad_right("Average", 10),
                mins2readable(month.average_minutes, false, false)
            );
            println!(
                "{} {}",
                pad_right("Breaks", 10),
                mins2readable(month.break_minutes, false, false)
            );
        }
    }
    Ok(())
}
