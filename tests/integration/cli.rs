//! End-to-end runs of the gosh binary

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn gosh_with_env(
    dir: &Path,
    args: &[&str],
    stdin: &str,
    load_path: Option<&str>,
) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_gosh"));
    command
        .args(args)
        .current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env_remove("GOSH_LOAD_PATH")
        .env_remove("GOSH_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(path) = load_path {
        command.env("GOSH_LOAD_PATH", path);
    }

    let mut child = command.spawn().expect("failed to spawn gosh");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().expect("failed to wait for gosh")
}

fn gosh(
    dir: &Path,
    args: &[&str],
) -> Output {
    gosh_with_env(dir, args, "", None)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn workdir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

#[test]
fn test_version() {
    let dir = workdir(&[]);
    let output = gosh(dir.path(), &["-q", "-V"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).starts_with("gosh scheme shell, version "));
}

#[test]
fn test_help_exits_1() {
    let dir = workdir(&[]);
    let output = gosh(dir.path(), &["-h"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).starts_with("Usage: gosh"));
}

#[test]
fn test_unknown_further_option() {
    let dir = workdir(&[]);
    let output = gosh(dir.path(), &["-fbogus"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("unknown -f option: bogus"));
    assert!(err.contains("supported options are: -fcase-fold"));
}

#[test]
fn test_unknown_profiler_option_only_warns() {
    let dir = workdir(&[]);
    let output = gosh(dir.path(), &["-q", "-pmemory", "-e", "(display 1)", "-b"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "1");
    assert!(stderr(&output).contains("unknown -p option: memory"));
}

#[test]
fn test_script_without_main_exits_0() {
    let dir = workdir(&[("hello.scm", "(display \"hello\")")]);
    let output = gosh(dir.path(), &["-q", "hello.scm"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "hello");
}

#[test]
fn test_main_result_is_exit_status() {
    let dir = workdir(&[("count.scm", "(define (main args) (length args))")]);
    let output = gosh(dir.path(), &["-q", "count.scm", "a", "b", "c"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_main_error_exits_70() {
    let dir = workdir(&[("fail.scm", "(define (main args) (error \"boom\"))")]);
    let output = gosh(dir.path(), &["-q", "fail.scm"]);
    assert_eq!(output.status.code(), Some(70));
    assert!(stderr(&output).contains("boom"));
}

#[test]
fn test_main_non_integer_exits_70() {
    let dir = workdir(&[("sym.scm", "(define (main args) 'done)")]);
    let output = gosh(dir.path(), &["-q", "sym.scm"]);
    assert_eq!(output.status.code(), Some(70));
}

#[test]
fn test_program_name_and_argv() {
    let dir = workdir(&[(
        "args.scm",
        "(display *program-name*) (newline) (display (length *argv*))",
    )]);
    let output = gosh(dir.path(), &["-q", "args.scm", "x", "y"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "args.scm\n2");
}

#[test]
fn test_empty_script_name() {
    let dir = workdir(&[]);
    let output = gosh(dir.path(), &["-q", ""]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("gosh: bad script name"));
}

#[test]
fn test_missing_script() {
    let dir = workdir(&[]);
    let output = gosh(dir.path(), &["-q", "nothere.scm"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("gosh: <system-error>"));
}

#[test]
fn test_deferred_actions_keep_order() {
    let dir = workdir(&[]);
    let output = gosh(
        dir.path(),
        &["-q", "-e", "(display 1)", "-E", "display 2", "-e(display 3)", "-b"],
    );
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "123");
}

#[test]
fn test_replay_stops_at_first_failure() {
    let dir = workdir(&[]);
    let output = gosh(
        dir.path(),
        &["-q", "-e", "(display 1)", "-e", "(car 1)", "-e", "(display 2)", "-b"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "1");
    assert!(stderr(&output).contains("gosh: <error>"));
}

#[test]
fn test_optional_and_required_loads() {
    let dir = workdir(&[]);
    let optional = gosh(dir.path(), &["-q", "-Lmissing.scm", "-b"]);
    assert_eq!(optional.status.code(), Some(0));

    let required = gosh(dir.path(), &["-q", "-lmissing.scm", "-b"]);
    assert_eq!(required.status.code(), Some(1));
}

#[test]
fn test_batch_reads_stdin() {
    let dir = workdir(&[]);
    let output = gosh_with_env(
        dir.path(),
        &["-q", "-b"],
        "(define x 2)\n(display (* x 21))\n",
        None,
    );
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "42");

    let output = gosh_with_env(dir.path(), &["-q"], "(display 1)\n(car 1)\n(display 2)\n", None);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "1");
}

#[test]
fn test_use_module_from_load_path() {
    let dir = workdir(&[("lib/text/util.scm", "(define (shout s) (string-append s \"!\"))")]);
    let output = gosh(
        dir.path(),
        &["-q", "-Ilib", "-utext.util", "-e", "(display (shout \"hey\"))", "-b"],
    );
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(stdout(&output), "hey!");
}

#[test]
fn test_feature_visible_to_cond_expand() {
    let dir = workdir(&[]);
    let output = gosh(
        dir.path(),
        &[
            "-q",
            "-Fextra",
            "-e",
            "(cond-expand (extra (display \"yes\")) (else (display \"no\")))",
            "-b",
        ],
    );
    assert_eq!(stdout(&output), "yes");
}

#[test]
fn test_init_file_from_load_path() {
    let dir = workdir(&[("site/gosh-init.scm", "(define from-init 7)")]);
    let output = gosh_with_env(dir.path(), &["-e", "(display from-init)", "-b"], "", Some("site"));
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(stdout(&output), "7");

    let output = gosh_with_env(
        dir.path(),
        &["-q", "-e", "(display from-init)", "-b"],
        "",
        Some("site"),
    );
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_collect_stats_report() {
    let dir = workdir(&[("s.scm", "(define (main args) 0)")]);
    let output = gosh(dir.path(), &["-q", "-fcollect-stats", "s.scm"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stderr(&output).contains(";; evaluator statistics"));
}

#[test]
fn test_profiler_report() {
    let dir = workdir(&[("s.scm", "(define (f) 1) (define (main args) (f) 0)")]);
    let output = gosh(dir.path(), &["-q", "-ptime", "s.scm"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stderr(&output).contains("Profiler statistics"));
}
