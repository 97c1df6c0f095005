//! Line-oriented driver: parse, dispatch, print.

use std::io::{BufRead, Write};

use crate::command::{Line, parse_line};
use crate::error::Result;
use crate::log_dev;
use crate::scheduler::Scheduler;

/// Printed when a blank line ends the session.
pub const FAREWELL: &str = "Break time!";

/// What happened over one session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Non-comment, non-blank lines processed.
    pub commands: usize,
    /// `event=error` lines emitted.
    pub errors: usize,
    /// Ended by a blank line rather than end of input.
    pub farewell: bool,
}

/// Feed every line of `input` to `scheduler`, writing log lines to `out`.
pub fn run_session<R: BufRead, W: Write>(
    input: R,
    out: &mut W,
    scheduler: &mut Scheduler,
) -> Result<SessionSummary> {
    let mut summary = SessionSummary::default();
    for raw in input.lines() {
        let raw = raw?;
        let logs = match parse_line(&raw) {
            Ok(Line::Blank) => {
                writeln!(out, "{FAREWELL}")?;
                summary.farewell = true;
                break;
            }
            Ok(Line::Comment) => continue,
            Ok(Line::Command(command)) => {
                log_dev!(?command, "dispatch");
                scheduler.execute(command)
            }
            Err(reason) => vec![scheduler.error_line(reason)],
        };
        summary.commands += 1;
        summary.errors += logs
            .iter()
            .filter(|line| line.contains(" event=error "))
            .count();
        for line in &logs {
            writeln!(out, "{line}")?;
        }
    }
    out.flush()?;
    Ok(summary)
}
