//! Café display board rendered after every turn.

use crate::scheduler::{Lane, Scheduler};

fn lane_line(lane: &Lane) -> String {
    let skip = if lane.skip { " [ skip]" } else { "" };
    let weight = if lane.weight != 1 {
        format!(" w={}", lane.weight)
    } else {
        String::new()
    };
    let tasks = lane
        .queue
        .iter()
        .map(|task| format!("{}:{}", task.id, task.remaining))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "display {} [{}/{}]{skip}{weight} -> [{tasks}]",
        lane.id,
        lane.queue.len(),
        lane.queue.capacity()
    )
}

/// Render the board: clock and next lane, the sorted menu, then one line
/// per lane in creation order. Read-only.
pub fn render(scheduler: &Scheduler) -> Vec<String> {
    let mut out = Vec::with_capacity(2 + scheduler.lanes().count());
    out.push(format!(
        "display time={} next={}",
        scheduler.time(),
        scheduler.next_lane().unwrap_or("none")
    ));
    let menu = scheduler
        .menu()
        .iter()
        .map(|(item, ticks)| format!("{item}:{ticks}"))
        .collect::<Vec<_>>()
        .join(",");
    out.push(format!("display menu=[{menu}]"));
    out.extend(scheduler.lanes().map(lane_line));
    out
}
