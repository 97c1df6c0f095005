//! Line parser turning one input line into a typed [`Command`].

use crate::error::CommandError;

/// A fully-shaped scheduler command. Numeric fields are parsed but not yet
/// range-checked; the scheduler owns semantic validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Create { lane: String, capacity: i64 },
    Enqueue { lane: String, item: String },
    Skip { lane: String },
    Run { quantum: i64, steps: Option<i64> },
    Special { item: String, burst: i64, start: i64, end: i64 },
    SetWeight { lane: String, weight: i64 },
}

/// What a raw input line means to the session driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    /// Exactly empty (line terminator aside): ends the session.
    Blank,
    /// `#`-prefixed or whitespace-only; ignored.
    Comment,
    Command(Command),
}

fn int(token: &str) -> Result<i64, CommandError> {
    token.parse::<i64>().map_err(|_| CommandError::BadArgs)
}

/// Classify and parse one line. Keywords are case-insensitive.
pub fn parse_line(raw: &str) -> Result<Line, CommandError> {
    if raw.trim_end_matches(['\r', '\n']).is_empty() {
        return Ok(Line::Blank);
    }
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Line::Comment);
    }

    let mut tokens = line.split_whitespace();
    let keyword = tokens.next().unwrap_or_default().to_ascii_uppercase();
    let args: Vec<&str> = tokens.collect();

    let command = match (keyword.as_str(), args.as_slice()) {
        ("CREATE", [lane, capacity]) => Command::Create {
            lane: lane.to_string(),
            capacity: int(capacity)?,
        },
        ("ENQ", [lane, item]) => Command::Enqueue {
            lane: lane.to_string(),
            item: item.to_string(),
        },
        ("SKIP", [lane]) => Command::Skip {
            lane: lane.to_string(),
        },
        ("RUN", [quantum]) => Command::Run {
            quantum: int(quantum)?,
            steps: None,
        },
        ("RUN", [quantum, steps]) => Command::Run {
            quantum: int(quantum)?,
            steps: Some(int(steps)?),
        },
        ("SPECIAL", [item, burst, start, end]) => Command::Special {
            item: item.to_string(),
            burst: int(burst)?,
            start: int(start)?,
            end: int(end)?,
        },
        ("SETWEIGHT", [lane, weight]) => Command::SetWeight {
            lane: lane.to_string(),
            weight: int(weight)?,
        },
        ("CREATE" | "ENQ" | "SKIP" | "RUN" | "SPECIAL" | "SETWEIGHT", _) => {
            return Err(CommandError::BadArgs);
        }
        _ => return Err(CommandError::UnknownCommand),
    };
    Ok(Line::Command(command))
}
