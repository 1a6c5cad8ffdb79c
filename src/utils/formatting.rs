//! Formatting utilities used for CLI output and the presentation timer.

pub fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

pub fn pad_right(s: &str, width: usize) -> String {
    format!("{:<width$}", s, width = width)
}

/// `HH:MM:SS` for a number of seconds; negative input renders as zero.
/// Hours are not wrapped at 24.
pub fn format_hms(seconds: i64) -> String {
    let s = seconds.max(0);
    format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
}

pub fn mins2readable(mins: i64, want_sign: bool, short: bool) -> String {
    let abs_m = mins.abs();
    let hours = abs_m / 60;
    let minutes = abs_m % 60;

    let sign = if mins > 0 && want_sign {
        "+"
    } else if mins < 0 && want_sign {
        "-"
    } else {
        ""
    };

    if short {
        // es: +02:25 oppure -01:10
        format!("{}{:02}:{:02}", sign, hours, minutes)
    } else {
        // es: +02h 25m oppure -01h 10m
        format!("{}{:02}h {:02}m", sign, hours, minutes)
    }
}
