//! Demo, benchmark, and stress runners built on the scheduler.

use std::io::{self, Write};
use std::time::Instant;

use crate::cli::{BenchArgs, StressArgs};
use crate::error::{Result, SessionError};
use crate::log_dev;
use crate::scheduler::{MAX_LANE_CAPACITY, Scheduler};
use crate::session::run_session;
use crate::types::{MENU, Ticks};

/// Script replayed by `demo`: weights, a special, a skip, both reject kinds
/// and one refused run.
pub const DEMO_SCRIPT: &str = "\
# Morning rush
CREATE counter 3
CREATE drive_thru 2
CREATE mobile 2
SETWEIGHT drive_thru 2
SPECIAL latte 1 0 4
ENQ counter latte
ENQ counter mocha
ENQ drive_thru americano
ENQ drive_thru hot_chocolate
ENQ drive_thru tea
ENQ mobile espresso
ENQ mobile cappuccino
SKIP counter
RUN 2 3
RUN 1 9
ENQ mobile latte
RUN 1

";

const CSV_HEADER: &str = "lanes,tasks_per_lane,quantum,total_tasks,turns,log_lines,logical_time,elapsed_ms,throughput_turns_per_s,cpu_user_s,cpu_sys_s,leftover";

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    use libc::{RUSAGE_SELF, getrusage, rusage};
    // SAFETY: rusage is plain old data; all-zero is a valid value.
    let mut usage: rusage = unsafe { std::mem::zeroed() };
    // SAFETY: the pointer refers to a live, writable rusage.
    let rc = unsafe { getrusage(RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let seconds = |tv: libc::timeval| tv.tv_sec as f64 + tv.tv_usec as f64 / 1_000_000.0;
    Some((seconds(usage.ru_utime), seconds(usage.ru_stime)))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// Aggregated metrics from a single benchmark run.
struct BenchResult {
    lanes: usize,
    tasks_per_lane: usize,
    quantum: u64,
    total_tasks: usize,
    turns: usize,
    log_lines: usize,
    logical_time: Ticks,
    expected_time: Ticks,
    finished: usize,
    elapsed_ms: f64,
    throughput: f64,
    cpu_user_s: Option<f64>,
    cpu_sys_s: Option<f64>,
    leftover: usize,
}

impl BenchResult {
    fn csv_row(&self) -> String {
        let fmt_cpu = |value: Option<f64>| {
            value
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "NA".to_string())
        };
        format!(
            "{},{},{},{},{},{},{},{:.2},{:.2},{},{},{}",
            self.lanes,
            self.tasks_per_lane,
            self.quantum,
            self.total_tasks,
            self.turns,
            self.log_lines,
            self.logical_time,
            self.elapsed_ms,
            self.throughput,
            fmt_cpu(self.cpu_user_s),
            fmt_cpu(self.cpu_sys_s),
            self.leftover
        )
    }

    /// Violations found when `validate` is on.
    fn violations(&self) -> Vec<&'static str> {
        let mut found = Vec::new();
        if self.logical_time != self.expected_time {
            found.push("clock_accounting");
        }
        if self.finished != self.total_tasks {
            found.push("finish_count");
        }
        if self.leftover > 0 {
            found.push("not_quiescent");
        }
        found
    }
}

fn check_shape(lanes: usize, tasks_per_lane: usize, quantum: u64) -> Result<()> {
    if lanes == 0 {
        return Err(SessionError::invalid("lanes must be > 0"));
    }
    if tasks_per_lane == 0 || tasks_per_lane > MAX_LANE_CAPACITY {
        return Err(SessionError::invalid(format!(
            "tasks_per_lane must be in 1..={MAX_LANE_CAPACITY}"
        )));
    }
    if quantum == 0 || i64::try_from(quantum).is_err() {
        return Err(SessionError::invalid("quantum must be in 1..=i64::MAX"));
    }
    Ok(())
}

fn benchmark_once(lanes: usize, tasks_per_lane: usize, quantum: u64) -> BenchResult {
    let mut scheduler = Scheduler::new();
    let mut expected_time: Ticks = 0;
    for lane in 0..lanes {
        let id = format!("l{lane}");
        scheduler.create_queue(&id, tasks_per_lane as i64);
        for n in 0..tasks_per_lane {
            let (item, burst) = MENU[(lane + n) % MENU.len()];
            scheduler.enqueue(&id, item);
            expected_time += burst;
        }
    }
    let total_tasks = lanes * tasks_per_lane;
    log_dev!(lanes, total_tasks, quantum, "bench workload loaded");

    let cpu_start = cpu_times_seconds();
    let start = Instant::now();
    // Shape was checked, so the quantum fits in i64.
    let logs = scheduler.run(quantum as i64, None);
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    let turns = logs.iter().filter(|l| l.contains(" event=run ")).count();
    let finished = logs.iter().filter(|l| l.contains(" event=finish ")).count();
    let throughput = if elapsed_ms > 0.0 {
        turns as f64 / (elapsed_ms / 1000.0)
    } else {
        0.0
    };
    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };

    BenchResult {
        lanes,
        tasks_per_lane,
        quantum,
        total_tasks,
        turns,
        log_lines: logs.len(),
        logical_time: scheduler.time(),
        expected_time,
        finished,
        elapsed_ms,
        throughput,
        cpu_user_s,
        cpu_sys_s,
        leftover: scheduler.lanes().map(|lane| lane.queue.len()).sum(),
    }
}

fn report(result: &BenchResult, validate: bool) {
    println!("{}", result.csv_row());
    if result.leftover > 0 {
        eprintln!("# warning,leftover_tasks,{}", result.leftover);
    }
    if validate {
        for violation in result.violations() {
            eprintln!("# violation,{violation}");
        }
    }
}

/// Replay [`DEMO_SCRIPT`] and print a summary block.
pub fn run_demo() -> Result<()> {
    log_dev!("[DEMO] start");
    let mut scheduler = Scheduler::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = run_session(DEMO_SCRIPT.as_bytes(), &mut out, &mut scheduler)?;

    writeln!(out, "DEMO SUMMARY")?;
    writeln!(out, "commands={} errors={}", summary.commands, summary.errors)?;
    writeln!(out, "final_time={}", scheduler.time())?;
    let lanes: Vec<String> = scheduler
        .lanes()
        .map(|lane| format!("{}:w{}", lane.id, lane.weight))
        .collect();
    writeln!(out, "lanes=[{}]", lanes.join(","))?;
    writeln!(out, "quiescent={}", scheduler.is_quiescent())?;
    Ok(())
}

/// Run a single benchmark and print one CSV row.
pub fn run_benchmark(args: &BenchArgs) -> Result<()> {
    check_shape(args.lanes, args.tasks_per_lane, args.quantum)?;
    let result = benchmark_once(args.lanes, args.tasks_per_lane, args.quantum);
    println!("{CSV_HEADER}");
    report(&result, args.validate);
    Ok(())
}

/// Sweep every lane/task/quantum combination and print CSV output.
pub fn run_stress(args: &StressArgs) -> Result<()> {
    for &lanes in &args.lane_sets {
        for &tasks in &args.task_sets {
            for &quantum in &args.quanta {
                check_shape(lanes, tasks, quantum)?;
            }
        }
    }

    println!("{CSV_HEADER}");
    for &lanes in &args.lane_sets {
        for &tasks_per_lane in &args.task_sets {
            for &quantum in &args.quanta {
                let result = benchmark_once(lanes, tasks_per_lane, quantum);
                report(&result, args.validate);
            }
        }
    }
    Ok(())
}
