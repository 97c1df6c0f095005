mod cli;
mod command;
mod display;
mod error;
mod logging;
mod scheduler;
mod session;
mod sim;
mod task_queue;
mod types;

fn main() {
    logging::init();
    if let Err(err) = cli::run_from_env() {
        eprintln!("cafe_scheduler: {err}");
        std::process::exit(err.exit_code());
    }
}
