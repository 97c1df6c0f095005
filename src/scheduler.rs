//! Weighted multi-lane round-robin scheduler and its command handlers.
//!
//! Every handler returns the log lines it produced, already formatted as
//! `time=<t> event=<name> ...`. A refused command yields exactly one line and
//! leaves the scheduler untouched. `run` is the only handler that mutates
//! incrementally: each executed turn is committed before the next begins.

use std::collections::{BTreeMap, HashMap};

use crate::command::Command;
use crate::display;
use crate::error::CommandError;
use crate::log_dev;
use crate::task_queue::TaskQueue;
use crate::types::{LaneId, MENU, Task, Ticks, task_id};

/// Log target for the customer-facing "Sorry, ..." notices on rejected orders.
pub const COUNTER_TARGET: &str = "cafe_scheduler::counter";

/// Largest ring a single `CREATE` may allocate.
pub const MAX_LANE_CAPACITY: usize = 65_536;

/// One named queue plus the per-lane scheduling state.
pub struct Lane {
    pub id: LaneId,
    pub queue: TaskQueue,
    /// Pending one-shot skip of this lane's next turn.
    pub skip: bool,
    /// Quantum multiplier, always >= 1.
    pub weight: u64,
    /// Task ids handed out so far, rejected ones included.
    issued: u64,
}

impl Lane {
    fn new(id: &str, capacity: usize) -> Self {
        Self {
            id: id.to_string(),
            queue: TaskQueue::new(capacity),
            skip: false,
            weight: 1,
            issued: 0,
        }
    }

    fn next_task_id(&mut self) -> String {
        self.issued += 1;
        task_id(&self.id, self.issued)
    }
}

/// Time-windowed burst override registered by `SPECIAL`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Special {
    item: String,
    burst: Ticks,
    start: i64,
    end: i64,
}

impl Special {
    fn covers(&self, item: &str, time: Ticks) -> bool {
        self.item == item && i64::try_from(time).is_ok_and(|t| self.start <= t && t < self.end)
    }
}

pub struct Scheduler {
    time: Ticks,
    /// Creation order; never reordered.
    lanes: Vec<Lane>,
    by_id: HashMap<LaneId, usize>,
    menu: BTreeMap<&'static str, Ticks>,
    specials: Vec<Special>,
    cursor: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            time: 0,
            lanes: Vec::new(),
            by_id: HashMap::new(),
            menu: MENU.iter().copied().collect(),
            specials: Vec::new(),
            cursor: 0,
        }
    }

    /// Current logical clock.
    pub fn time(&self) -> Ticks {
        self.time
    }

    /// Menu sorted by item name.
    pub fn menu(&self) -> &BTreeMap<&'static str, Ticks> {
        &self.menu
    }

    /// Lanes in creation order.
    pub fn lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.iter()
    }

    #[allow(dead_code)]
    pub fn lane(&self, id: &str) -> Option<&Lane> {
        self.by_id.get(id).map(|&index| &self.lanes[index])
    }

    fn lane_mut(&mut self, id: &str) -> Option<&mut Lane> {
        self.by_id.get(id).map(|&index| &mut self.lanes[index])
    }

    /// Lane that the next turn will examine.
    pub fn next_lane(&self) -> Option<&str> {
        self.lanes.get(self.cursor).map(|lane| lane.id.as_str())
    }

    /// Every lane empty and no skip pending.
    pub fn is_quiescent(&self) -> bool {
        self.lanes
            .iter()
            .all(|lane| lane.queue.is_empty() && !lane.skip)
    }

    /// Current display block; see [`display::render`].
    pub fn display(&self) -> Vec<String> {
        display::render(self)
    }

    /// Error line for a command refused before reaching a handler.
    pub fn error_line(&self, reason: CommandError) -> String {
        format!("time={} event=error reason={reason}", self.time)
    }

    fn lane_error(&self, lane: &str, reason: CommandError) -> Vec<String> {
        vec![format!(
            "time={} event=error queue={lane} reason={reason}",
            self.time
        )]
    }

    /// Dispatch a parsed command to its handler.
    pub fn execute(&mut self, command: Command) -> Vec<String> {
        match command {
            Command::Create { lane, capacity } => self.create_queue(&lane, capacity),
            Command::Enqueue { lane, item } => self.enqueue(&lane, &item),
            Command::Skip { lane } => self.mark_skip(&lane),
            Command::Run { quantum, steps } => self.run(quantum, steps),
            Command::Special {
                item,
                burst,
                start,
                end,
            } => self.special(&item, burst, start, end),
            Command::SetWeight { lane, weight } => self.set_weight(&lane, weight),
        }
    }

    pub fn create_queue(&mut self, lane: &str, capacity: i64) -> Vec<String> {
        let capacity = match usize::try_from(capacity) {
            Ok(capacity) if capacity <= MAX_LANE_CAPACITY => capacity,
            _ => return self.lane_error(lane, CommandError::BadCreate),
        };
        if self.by_id.contains_key(lane) {
            return self.lane_error(lane, CommandError::BadCreate);
        }
        self.by_id.insert(lane.to_string(), self.lanes.len());
        self.lanes.push(Lane::new(lane, capacity));
        log_dev!(lane, capacity, "lane created");
        vec![format!("time={} event=create queue={lane}", self.time)]
    }

    /// Burst for `item` at the current time: first matching special, else
    /// the menu default.
    fn effective_burst(&self, item: &str) -> Option<Ticks> {
        let base = self.menu.get(item).copied()?;
        Some(
            self.specials
                .iter()
                .find(|special| special.covers(item, self.time))
                .map_or(base, |special| special.burst),
        )
    }

    pub fn enqueue(&mut self, lane: &str, item: &str) -> Vec<String> {
        let time = self.time;
        let burst = self.effective_burst(item);
        let Some(target) = self.lane_mut(lane) else {
            return self.lane_error(lane, CommandError::UnknownQueue);
        };
        let id = target.next_task_id();
        let Some(burst) = burst else {
            tracing::warn!(target: COUNTER_TARGET, lane, item, "Sorry, we don't serve that.");
            return vec![format!(
                "time={time} event=reject queue={lane} task={id} reason={}",
                CommandError::UnknownItem
            )];
        };
        if target.queue.enqueue(Task::new(id.clone(), burst)).is_err() {
            tracing::warn!(target: COUNTER_TARGET, lane, item, "Sorry, we're at capacity.");
            return vec![format!(
                "time={time} event=reject queue={lane} task={id} reason={}",
                CommandError::Full
            )];
        }
        vec![format!(
            "time={time} event=enqueue queue={lane} task={id} remaining={burst}"
        )]
    }

    pub fn mark_skip(&mut self, lane: &str) -> Vec<String> {
        let Some(target) = self.lane_mut(lane) else {
            return self.lane_error(lane, CommandError::UnknownQueue);
        };
        target.skip = true;
        vec![format!("time={} event=skip queue={lane}", self.time)]
    }

    pub fn special(&mut self, item: &str, burst: i64, start: i64, end: i64) -> Vec<String> {
        if !self.menu.contains_key(item) {
            return vec![self.error_line(CommandError::UnknownItem)];
        }
        let Ok(ticks) = Ticks::try_from(burst) else {
            return vec![self.error_line(CommandError::BadBurst)];
        };
        if start >= end {
            log_dev!(item, start, end, "special window is empty and will never match");
        }
        self.specials.push(Special {
            item: item.to_string(),
            burst: ticks,
            start,
            end,
        });
        vec![format!(
            "time={} event=special item={item} burst={burst} start={start} end={end}",
            self.time
        )]
    }

    pub fn set_weight(&mut self, lane: &str, weight: i64) -> Vec<String> {
        let weight = match u64::try_from(weight) {
            Ok(weight) if weight >= 1 => weight,
            _ => return self.lane_error(lane, CommandError::BadWeight),
        };
        let Some(target) = self.lane_mut(lane) else {
            return self.lane_error(lane, CommandError::BadWeight);
        };
        target.weight = weight;
        vec![format!(
            "time={} event=setweight queue={lane} weight={weight}",
            self.time
        )]
    }

    /// Execute turns until `steps` turns are done or, when unbounded, until
    /// the scheduler is quiescent after a turn.
    pub fn run(&mut self, quantum: i64, steps: Option<i64>) -> Vec<String> {
        if self.lanes.is_empty() {
            return vec![self.error_line(CommandError::NoQueues)];
        }
        let quantum = match Ticks::try_from(quantum) {
            Ok(quantum) if quantum >= 1 => quantum,
            _ => return vec![self.error_line(CommandError::BadQuantum)],
        };
        let limit = match steps {
            None => None,
            Some(steps) => match usize::try_from(steps) {
                Ok(steps) if (1..=self.lanes.len()).contains(&steps) => Some(steps),
                _ => return vec![self.error_line(CommandError::InvalidSteps)],
            },
        };

        let start = self.time;
        let mut logs = Vec::new();
        let mut turns = 0usize;
        loop {
            self.turn(quantum, &mut logs);
            turns += 1;
            match limit {
                Some(limit) if turns >= limit => break,
                None if self.is_quiescent() => break,
                _ => {}
            }
        }
        log_dev!(turns, from = start, to = self.time, "run complete");
        logs
    }

    fn turn(&mut self, quantum: Ticks, logs: &mut Vec<String>) {
        let lane = &mut self.lanes[self.cursor];
        logs.push(format!("time={} event=run queue={}", self.time, lane.id));

        if lane.skip {
            lane.skip = false;
        } else if let Some(mut task) = lane.queue.dequeue() {
            let work = task.remaining.min(quantum.saturating_mul(lane.weight));
            self.time = self.time.saturating_add(work);
            task.remaining -= work;
            if task.remaining == 0 {
                logs.push(format!(
                    "time={} event=finish queue={} task={} work={work}",
                    self.time, lane.id, task.id
                ));
            } else {
                logs.push(format!(
                    "time={} event=work queue={} task={} work={work} remaining={}",
                    self.time, lane.id, task.id, task.remaining
                ));
                // The slot freed by the dequeue above is always available.
                if let Err(task) = lane.queue.enqueue(task) {
                    tracing::error!(lane = %lane.id, task = %task.id, "re-enqueue failed");
                }
            }
        }

        self.cursor = (self.cursor + 1) % self.lanes.len();
        logs.extend(self.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sched(script: &[&str]) -> (Scheduler, Vec<String>) {
        let mut scheduler = Scheduler::new();
        let mut logs = Vec::new();
        for raw in script {
            match crate::command::parse_line(raw) {
                Ok(crate::command::Line::Command(cmd)) => logs.extend(scheduler.execute(cmd)),
                other => panic!("bad test script line {raw:?}: {other:?}"),
            }
        }
        (scheduler, logs)
    }

    fn events<'a>(logs: &'a [String], name: &str) -> Vec<&'a String> {
        let needle = format!(" event={name} ");
        logs.iter().filter(|line| line.contains(&needle)).collect()
    }

    fn queued(scheduler: &Scheduler, lane: &str) -> Vec<(String, Ticks)> {
        scheduler
            .lane(lane)
            .expect("lane missing")
            .queue
            .iter()
            .map(|task| (task.id.clone(), task.remaining))
            .collect()
    }

    #[test]
    fn scenario_single_tea_finishes() {
        let (scheduler, logs) = sched(&["CREATE q1 2", "ENQ q1 tea", "RUN 1"]);
        assert_eq!(scheduler.time(), 1);
        assert!(logs.contains(&"time=1 event=finish queue=q1 task=q1-001 work=1".to_string()));
        assert_eq!(logs.last().map(String::as_str), Some("display q1 [0/2] -> []"));
    }

    #[test]
    fn scenario_full_lane_rejects() {
        let (scheduler, logs) = sched(&["CREATE q1 1", "ENQ q1 tea", "ENQ q1 latte"]);
        assert_eq!(
            logs,
            [
                "time=0 event=create queue=q1",
                "time=0 event=enqueue queue=q1 task=q1-001 remaining=1",
                "time=0 event=reject queue=q1 task=q1-002 reason=full",
            ]
        );
        assert_eq!(queued(&scheduler, "q1"), [("q1-001".to_string(), 1)]);
    }

    #[test]
    fn scenario_special_overrides_burst() {
        let (_, logs) = sched(&["SPECIAL tea 5 0 10", "CREATE q1 2", "ENQ q1 tea"]);
        assert_eq!(logs[0], "time=0 event=special item=tea burst=5 start=0 end=10");
        assert_eq!(logs[2], "time=0 event=enqueue queue=q1 task=q1-001 remaining=5");
    }

    #[test]
    fn scenario_weight_scales_quantum() {
        let (scheduler, logs) = sched(&[
            "CREATE q1 1",
            "CREATE q2 1",
            "SETWEIGHT q1 3",
            "ENQ q1 mocha",
            "RUN 1 1",
        ]);
        assert!(logs.contains(
            &"time=3 event=work queue=q1 task=q1-001 work=3 remaining=1".to_string()
        ));
        assert_eq!(scheduler.time(), 3);
        assert_eq!(queued(&scheduler, "q1"), [("q1-001".to_string(), 1)]);
        assert!(events(&logs, "finish").is_empty());
    }

    #[test]
    fn weighted_task_finishes_on_next_lane_turn() {
        let (scheduler, logs) = sched(&[
            "CREATE q1 1",
            "CREATE q2 1",
            "SETWEIGHT q1 3",
            "ENQ q1 mocha",
            "RUN 1",
        ]);
        let runs: Vec<_> = events(&logs, "run");
        assert_eq!(runs.len(), 3);
        assert!(logs.contains(&"time=4 event=finish queue=q1 task=q1-001 work=1".to_string()));
        assert_eq!(scheduler.time(), 4);
        assert_eq!(scheduler.next_lane(), Some("q2"));
    }

    #[test]
    fn scenario_skip_consumes_turn_without_work() {
        let (scheduler, logs) = sched(&["CREATE q1 1", "SKIP q1", "RUN 1 1"]);
        assert_eq!(scheduler.time(), 0);
        assert!(!scheduler.lane("q1").expect("lane").skip);
        assert_eq!(
            &logs[2..],
            [
                "time=0 event=run queue=q1",
                "display time=0 next=q1",
                "display menu=[americano:2,cappuccino:3,hot_chocolate:4,latte:3,macchiato:2,mocha:4,tea:1]",
                "display q1 [0/1] -> []",
            ]
        );
    }

    #[test]
    fn repeated_skip_still_skips_one_turn() {
        let (scheduler, logs) = sched(&["CREATE a 1", "ENQ a tea", "SKIP a", "SKIP a", "RUN 1"]);
        assert_eq!(events(&logs, "skip").len(), 2);
        assert_eq!(logs[2], "time=0 event=skip queue=a");
        assert_eq!(logs[3], "time=0 event=skip queue=a");
        let runs = events(&logs, "run");
        assert_eq!(runs.len(), 2);
        let first_turn: Vec<&String> = logs
            .iter()
            .skip_while(|line| !line.contains(" event=run "))
            .take(2)
            .collect();
        assert_eq!(first_turn, ["time=0 event=run queue=a", "display time=0 next=a"]);
        assert!(logs.contains(&"time=1 event=finish queue=a task=a-001 work=1".to_string()));
        assert_eq!(scheduler.time(), 1);
        assert!(!scheduler.lane("a").expect("lane").skip);
    }

    #[test]
    fn skip_defers_work_by_one_rotation() {
        let (scheduler, logs) = sched(&[
            "CREATE a 2",
            "CREATE b 2",
            "ENQ a tea",
            "ENQ b tea",
            "SKIP a",
            "RUN 1",
        ]);
        let finishes: Vec<_> = events(&logs, "finish");
        assert_eq!(
            finishes,
            [
                "time=1 event=finish queue=b task=b-001 work=1",
                "time=2 event=finish queue=a task=a-001 work=1",
            ]
        );
        assert_eq!(scheduler.time(), 2);
    }

    #[test]
    fn skip_flag_shows_in_display_until_cleared() {
        let (scheduler, _) = sched(&["CREATE a 1", "CREATE b 1", "SKIP b", "SETWEIGHT b 2"]);
        assert_eq!(
            scheduler.display().last().map(String::as_str),
            Some("display b [0/1] [ skip] w=2 -> []")
        );
    }

    #[test]
    fn validation_errors_leave_state_untouched() {
        let (scheduler, logs) = sched(&[
            "RUN 1",
            "CREATE q1 -1",
            "CREATE q1 1",
            "CREATE q1 3",
            "ENQ nope tea",
            "SKIP nope",
            "SETWEIGHT q1 0",
            "SETWEIGHT nope 2",
            "SPECIAL espresso 1 0 5",
            "SPECIAL tea -1 0 5",
            "RUN 0",
            "RUN 1 0",
            "RUN 1 2",
        ]);
        assert_eq!(
            logs,
            [
                "time=0 event=error reason=no_queues",
                "time=0 event=error queue=q1 reason=bad_create",
                "time=0 event=create queue=q1",
                "time=0 event=error queue=q1 reason=bad_create",
                "time=0 event=error queue=nope reason=unknown_queue",
                "time=0 event=error queue=nope reason=unknown_queue",
                "time=0 event=error queue=q1 reason=bad_weight",
                "time=0 event=error queue=nope reason=bad_weight",
                "time=0 event=error reason=unknown_item",
                "time=0 event=error reason=bad_burst",
                "time=0 event=error reason=bad_quantum",
                "time=0 event=error reason=invalid_steps",
                "time=0 event=error reason=invalid_steps",
            ]
        );
        let lane = scheduler.lane("q1").expect("lane");
        assert_eq!(lane.queue.capacity(), 1);
        assert_eq!(lane.weight, 1);
        assert!(scheduler.specials.is_empty());
    }

    #[test]
    fn oversized_capacity_is_refused() {
        let (scheduler, logs) = sched(&["CREATE big 99999999999"]);
        assert_eq!(logs, ["time=0 event=error queue=big reason=bad_create"]);
        assert!(scheduler.lane("big").is_none());
    }

    #[test]
    fn unknown_item_reject_consumes_task_id() {
        let (scheduler, logs) = sched(&["CREATE q1 2", "ENQ q1 espresso", "ENQ q1 latte"]);
        assert_eq!(logs[1], "time=0 event=reject queue=q1 task=q1-001 reason=unknown_item");
        assert_eq!(logs[2], "time=0 event=enqueue queue=q1 task=q1-002 remaining=3");
        assert_eq!(queued(&scheduler, "q1"), [("q1-002".to_string(), 3)]);
    }

    #[test]
    fn specials_resolve_first_match_within_window() {
        let (_, logs) = sched(&[
            "SPECIAL latte 7 0 3",
            "SPECIAL latte 9 0 10",
            "CREATE q1 4",
            "ENQ q1 latte",
            "ENQ q1 tea",
            "RUN 3 1",
            "ENQ q1 latte",
            "SPECIAL tea 6 4 5",
            "ENQ q1 tea",
        ]);
        assert_eq!(logs[3], "time=0 event=enqueue queue=q1 task=q1-001 remaining=7");
        // The tea default is untouched by latte specials.
        assert_eq!(logs[4], "time=0 event=enqueue queue=q1 task=q1-002 remaining=1");
        assert!(logs.contains(&"time=3 event=enqueue queue=q1 task=q1-003 remaining=9".to_string()));
        // time=3 sits before the tea window [4, 5).
        assert!(logs.contains(&"time=3 event=enqueue queue=q1 task=q1-004 remaining=1".to_string()));
    }

    #[test]
    fn special_window_end_is_exclusive() {
        let (_, logs) = sched(&[
            "SPECIAL tea 5 0 1",
            "CREATE q1 3",
            "ENQ q1 tea",
            "RUN 1 1",
            "ENQ q1 tea",
        ]);
        assert_eq!(logs[2], "time=0 event=enqueue queue=q1 task=q1-001 remaining=5");
        assert_eq!(logs.last().map(String::as_str), Some("time=1 event=enqueue queue=q1 task=q1-002 remaining=1"));
    }

    #[test]
    fn zero_burst_special_finishes_without_advancing_clock() {
        let (scheduler, logs) = sched(&["SPECIAL mocha 0 0 1", "CREATE q1 1", "ENQ q1 mocha", "RUN 2"]);
        assert!(logs.contains(&"time=0 event=finish queue=q1 task=q1-001 work=0".to_string()));
        assert_eq!(scheduler.time(), 0);
    }

    #[test]
    fn quiescent_run_executes_one_turn() {
        let (scheduler, logs) = sched(&["CREATE a 1", "CREATE b 1", "RUN 4"]);
        assert_eq!(events(&logs, "run").len(), 1);
        assert_eq!(scheduler.next_lane(), Some("b"));
    }

    #[test]
    fn unfinished_task_rejoins_tail_behind_waiting_tasks() {
        let (scheduler, _) = sched(&["CREATE q1 3", "ENQ q1 mocha", "ENQ q1 tea", "RUN 1 1"]);
        assert_eq!(
            queued(&scheduler, "q1"),
            [("q1-002".to_string(), 1), ("q1-001".to_string(), 3)]
        );
    }

    #[test]
    fn display_is_idempotent() {
        let (scheduler, _) = sched(&["CREATE q1 2", "ENQ q1 latte", "SETWEIGHT q1 2"]);
        assert_eq!(scheduler.display(), scheduler.display());
        assert_eq!(scheduler.time(), 0);
    }

    #[test]
    fn round_robin_serves_every_busy_lane_between_finishes() {
        let (_, logs) = sched(&[
            "CREATE a 3",
            "CREATE b 3",
            "CREATE c 3",
            "ENQ a mocha",
            "ENQ a mocha",
            "ENQ b latte",
            "ENQ c tea",
            "RUN 1",
        ]);
        let order: Vec<&str> = logs
            .iter()
            .filter(|line| line.contains(" event=work ") || line.contains(" event=finish "))
            .filter_map(|line| line.split(" queue=").nth(1))
            .filter_map(|rest| rest.split(' ').next())
            .collect();
        assert_eq!(
            order,
            ["a", "b", "c", "a", "b", "a", "b", "a", "a", "a", "a", "a"]
        );
    }

    proptest! {
        #[test]
        fn remaining_never_increases_and_all_work_is_accounted(
            items in proptest::collection::vec(0usize..7, 1..12),
            lanes in 1usize..4,
            quantum in 1i64..4,
        ) {
            let mut scheduler = Scheduler::new();
            for lane in 0..lanes {
                scheduler.create_queue(&format!("l{lane}"), 16);
            }
            let mut total = 0;
            for (n, item) in items.iter().enumerate() {
                let (name, burst) = MENU[*item];
                scheduler.enqueue(&format!("l{}", n % lanes), name);
                total += burst;
            }
            let order: Vec<String> = scheduler.lanes().map(|lane| lane.id.clone()).collect();

            let mut last: HashMap<String, Ticks> = HashMap::new();
            for _ in 0..200 {
                if scheduler.is_quiescent() {
                    break;
                }
                scheduler.run(quantum, Some(1));
                for lane in scheduler.lanes() {
                    prop_assert!(lane.queue.len() <= lane.queue.capacity());
                    for task in lane.queue.iter() {
                        prop_assert!(task.remaining > 0);
                        if let Some(prev) = last.insert(task.id.clone(), task.remaining) {
                            prop_assert!(task.remaining <= prev);
                        }
                    }
                }
            }
            prop_assert!(scheduler.is_quiescent());
            prop_assert_eq!(scheduler.time(), total);
            let after: Vec<String> = scheduler.lanes().map(|lane| lane.id.clone()).collect();
            prop_assert_eq!(order, after);
        }
    }
}
