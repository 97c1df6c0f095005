//! Shared identifiers, task model, and the café menu.

/// Name of a queue lane as given to `CREATE`.
pub type LaneId = String;
/// Service time, in logical clock ticks.
pub type Ticks = u64;

/// Fixed menu of items and their base service times.
pub const MENU: [(&str, Ticks); 7] = [
    ("americano", 2),
    ("latte", 3),
    ("cappuccino", 3),
    ("mocha", 4),
    ("tea", 1),
    ("macchiato", 2),
    ("hot_chocolate", 4),
];

/// One customer order waiting in a lane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    /// Stable `<lane>-<NNN>` identifier for logging and display.
    pub id: String,
    /// Outstanding service time.
    pub remaining: Ticks,
}

impl Task {
    /// Construct a new task with the provided id and burst.
    pub fn new(id: impl Into<String>, remaining: Ticks) -> Self {
        Self {
            id: id.into(),
            remaining,
        }
    }
}

/// Format the `seq`-th task id for a lane, zero-padded to three digits.
pub fn task_id(lane: &str, seq: u64) -> String {
    format!("{lane}-{seq:03}")
}
