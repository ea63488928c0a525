//! gosh - CLI

use std::process;

use gosh::launcher::signals::SignalPlan;
use gosh::{main_with_args, with_eval_stack};
use gosh::util::logger;
use tracing::warn;

fn main() {
    logger::init_from_env();

    if let Err(e) = SignalPlan::detect().apply() {
        warn!("cannot set the signal mask: {}", e);
    }

    let args: Vec<String> = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    // the mask is inherited by the evaluation thread
    let status = match with_eval_stack(move || main_with_args(args)) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("gosh: cannot start the evaluator thread: {}", e);
            1
        }
    };
    process::exit(status);
}
