use std::fmt;
use std::io::{self, IsTerminal, Write};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

#[derive(Clone, Copy)]
enum Kind {
    Info,
    Success,
    Warning,
    Error,
}

impl Kind {
    fn color(self) -> &'static str {
        match self {
            Kind::Info => "\x1b[34m",
            Kind::Success => "\x1b[32m",
            Kind::Warning => "\x1b[33m",
            Kind::Error => "\x1b[31m",
        }
    }

    fn icon(self) -> &'static str {
        match self {
            Kind::Info => "ℹ️",
            Kind::Success => "✅",
            Kind::Warning => "⚠️",
            Kind::Error => "❌",
        }
    }
}

/// Errors go to stderr, everything else to stdout. Colors only on a tty.
fn emit(kind: Kind, msg: &dyn fmt::Display) {
    let line = |tty: bool| {
        if tty {
            format!("{}{}{} {}{}", kind.color(), BOLD, kind.icon(), RESET, msg)
        } else {
            format!("{} {}", kind.icon(), msg)
        }
    };

    // a closed pipe is not worth a panic
    let _ = match kind {
        Kind::Error => {
            let mut err = io::stderr().lock();
            let tty = err.is_terminal();
            writeln!(err, "{}", line(tty))
        }
        _ => {
            let mut out = io::stdout().lock();
            let tty = out.is_terminal();
            writeln!(out, "{}", line(tty))
        }
    };
}

pub fn info<T: fmt::Display>(msg: T) {
    emit(Kind::Info, &msg);
}

pub fn success<T: fmt::Display>(msg: T) {
    emit(Kind::Success, &msg);
}

pub fn warning<T: fmt::Display>(msg: T) {
    emit(Kind::Warning, &msg);
}

pub fn error<T: fmt::Display>(msg: T) {
    emit(Kind::Error, &msg);
}

/// Section header
pub fn header<T: fmt::Display>(msg: T) {
    if io::stdout().is_terminal() {
        println!("{}{}== {} =={}", Kind::Info.color(), BOLD, msg, RESET);
    } else {
        println!("== {} ==", msg);
    }
}
