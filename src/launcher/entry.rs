//! Entry point dispatch
//!
//! After a script loads, `main` in the user namespace is called with the list
//! of arguments following the script name. Its result becomes the exit
//! status.

use tracing::debug;

use crate::launcher::script::ScriptInvocation;
use crate::runtime::Runtime;

/// Symbol of the script entry point
pub const ENTRY_SYMBOL: &str = "main";

/// Exit status for an error escaping `main`, or a non-integer result
pub const EX_SOFTWARE: i32 = 70;

/// Exit status for an integer returned by `main`, as the OS reports it
pub fn exit_status(value: i64) -> i32 {
    (value & 0xff) as i32
}

/// Call the entry point if the script defined one; returns the exit status
pub fn dispatch<R: Runtime>(
    runtime: &mut R,
    script: &ScriptInvocation,
) -> i32 {
    let Some(entry) = runtime.find_procedure(ENTRY_SYMBOL) else {
        debug!("{} defines no {} procedure", script.path, ENTRY_SYMBOL);
        return 0;
    };

    match runtime.apply_entry(&entry, script.rest_args()) {
        Ok(Some(value)) => exit_status(value),
        Ok(None) => EX_SOFTWARE,
        Err(condition) => {
            runtime.report_error(&condition);
            EX_SOFTWARE
        }
    }
}
