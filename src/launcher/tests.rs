use std::fs;
use std::io::{self, Cursor};
use std::path::PathBuf;

use tempfile::TempDir;

use super::*;
use crate::launcher::testing::{EntryBehavior, RecordingRuntime};
use crate::runtime::Condition;

fn args(list: &[&str]) -> Vec<String> {
    std::iter::once("gosh")
        .chain(list.iter().copied())
        .map(String::from)
        .collect()
}

/// A working directory holding `script.scm`
fn workdir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("script.scm"), "").unwrap();
    dir
}

fn launcher(
    runtime: RecordingRuntime,
    dir: &TempDir,
) -> Launcher<RecordingRuntime> {
    Launcher::new(runtime)
        .with_resolver(ScriptResolver::new().with_base(dir.path()))
        .with_input(Box::new(Cursor::new(Vec::new())), false)
}

fn calls(launcher: &Launcher<RecordingRuntime>) -> Vec<&str> {
    launcher.runtime().calls().iter().map(String::as_str).collect()
}

#[test]
fn test_scenario_quiet_path_load_script() {
    let dir = workdir();
    let mut l = launcher(RecordingRuntime::new(), &dir);
    let status = l.run(&args(&["-q", "-Ifoo", "-lbar.scm", "script.scm", "x", "y"]));

    assert_eq!(status, 0);
    assert_eq!(
        calls(&l),
        vec!["add_load_path foo Front", "load bar.scm Error", "load ./script.scm Error"]
    );
    assert_eq!(l.runtime().program_name.as_deref(), Some("script.scm"));
    let rest: Vec<&str> = l.runtime().program_args.iter().map(|a| &**a).collect();
    assert_eq!(rest, vec!["x", "y"]);
}

#[test]
fn test_init_file_loads_before_replay() {
    let dir = workdir();
    let mut l = launcher(RecordingRuntime::new(), &dir);
    assert_eq!(l.run(&args(&["-e", "(f)", "script.scm"])), 0);
    assert_eq!(
        calls(&l),
        vec!["load gosh-init.scm Ignore", "eval_string (f)", "load ./script.scm Error"]
    );
}

#[test]
fn test_init_file_failure_only_warns() {
    let dir = workdir();
    let rt = RecordingRuntime::new().fail_on("load gosh-init.scm Ignore");
    let mut l = launcher(rt, &dir);
    assert_eq!(l.run(&args(&["script.scm"])), 0);
    assert_eq!(calls(&l).last(), Some(&"load ./script.scm Error"));
}

#[test]
fn test_replay_failure_stops_bootstrap_without_cleanup() {
    let dir = workdir();
    let rt = RecordingRuntime::new().fail_on("load bar.scm Error");
    let mut l = launcher(rt, &dir);
    let status = l.run(&args(&["-q", "-fcollect-stats", "-lbar.scm", "-e", "(f)", "script.scm"]));

    assert_eq!(status, 1);
    assert_eq!(calls(&l), vec!["load bar.scm Error"]);
}

#[test]
fn test_entry_result_is_exit_status() {
    let dir = workdir();
    let rt = RecordingRuntime::new().with_procedure("main", EntryBehavior::Returns(3));
    let mut l = launcher(rt, &dir);
    assert_eq!(l.run(&args(&["-q", "script.scm", "a"])), 3);
    let entry_args: Vec<&str> = l
        .runtime()
        .entry_args
        .as_ref()
        .unwrap()
        .iter()
        .map(|a| &**a)
        .collect();
    assert_eq!(entry_args, vec!["a"]);
}

#[test]
fn test_entry_error_runs_cleanup() {
    let dir = workdir();
    let rt = RecordingRuntime::new()
        .with_procedure("main", EntryBehavior::Raises(Condition::error("boom")));
    let mut l = launcher(rt, &dir);
    assert_eq!(l.run(&args(&["-q", "-fcollect-stats", "script.scm"])), 70);
    assert_eq!(l.runtime().reported, vec![Condition::error("boom")]);
    assert_eq!(calls(&l).last(), Some(&"write_report VmStats"));
}

#[test]
fn test_script_load_failure_exits_1_and_runs_cleanup() {
    let dir = workdir();
    let rt = RecordingRuntime::new()
        .fail_on("load missing.scm Error")
        .with_procedure("main", EntryBehavior::Returns(5));
    let mut l = launcher(rt, &dir);
    assert_eq!(l.run(&args(&["-q", "-pload", "missing.scm"])), 1);
    assert!(!calls(&l).contains(&"apply_entry"));
    assert_eq!(calls(&l).last(), Some(&"write_report LoadStats"));
}

#[test]
fn test_empty_script_name_fails_before_any_load() {
    let dir = workdir();
    let mut l = launcher(RecordingRuntime::new(), &dir);
    assert_eq!(l.run(&args(&["-lfirst.scm", ""])), 1);
    assert!(calls(&l).is_empty());
}

#[test]
fn test_load_path_sources_in_order() {
    let dir = workdir();
    let mut config = LauncherConfig::default();
    config.load.paths = vec![PathBuf::from("cfg")];
    let mut l = launcher(RecordingRuntime::new(), &dir)
        .with_config(config)
        .with_env_paths(vec![PathBuf::from("env1"), PathBuf::from("env2")]);
    assert_eq!(l.run(&args(&["-q", "-Icli", "script.scm"])), 0);
    assert_eq!(
        &calls(&l)[..4],
        &[
            "add_load_path env2 Front",
            "add_load_path env1 Front",
            "add_load_path cfg Back",
            "add_load_path cli Front",
        ]
    );
}

#[test]
fn test_test_mode_adds_source_tree() {
    let dir = TempDir::new().unwrap();
    for sub in ["src", "libsrc", "lib", "work"] {
        fs::create_dir(dir.path().join(sub)).unwrap();
    }
    let base = dir.path().join("work");
    assert_eq!(test_load_paths(&base), vec!["../src", "../libsrc", "../lib"]);
    assert!(test_load_paths(dir.path()).is_empty());

    let mut l = Launcher::new(RecordingRuntime::new())
        .with_resolver(ScriptResolver::new().with_base(&base))
        .with_input(Box::new(Cursor::new(Vec::new())), false);
    assert_eq!(l.run(&args(&["-q", "-ftest", "-b"])), 0);
    assert_eq!(
        calls(&l),
        vec![
            "add_load_path ../src Front",
            "add_load_path ../libsrc Front",
            "add_load_path ../lib Front",
            "load_from_reader",
        ]
    );
}

#[test]
fn test_test_mode_tree_needs_every_build_dir() {
    let dir = TempDir::new().unwrap();
    for sub in ["src", "lib", "work"] {
        fs::create_dir(dir.path().join(sub)).unwrap();
    }
    assert!(test_load_paths(&dir.path().join("work")).is_empty());
}

#[test]
fn test_test_mode_searches_lib_before_other_paths() {
    let dir = TempDir::new().unwrap();
    for sub in ["src", "libsrc", "lib", "work"] {
        fs::create_dir(dir.path().join(sub)).unwrap();
    }
    let mut config = LauncherConfig::default();
    config.load.paths = vec![PathBuf::from("cfg")];
    let interpreter = Interpreter::with_output(Box::new(io::sink()));
    let mut l = Launcher::new(interpreter)
        .with_config(config)
        .with_env_paths(vec![PathBuf::from("env")])
        .with_resolver(ScriptResolver::new().with_base(dir.path().join("work")))
        .with_input(Box::new(Cursor::new(Vec::new())), false);
    assert_eq!(l.run(&args(&["-q", "-ftest", "-b"])), 0);
    assert_eq!(
        l.runtime().load_paths(),
        &[
            PathBuf::from("../lib"),
            PathBuf::from("../libsrc"),
            PathBuf::from("../src"),
            PathBuf::from("env"),
            PathBuf::from("cfg"),
        ]
    );
}

#[test]
fn test_profiler_lifecycle() {
    let dir = workdir();
    let mut l = launcher(RecordingRuntime::new(), &dir);
    assert_eq!(l.run(&args(&["-q", "-ptime", "script.scm"])), 0);
    assert_eq!(
        calls(&l),
        vec![
            "require gosh/vm/profiler",
            "start_profiler",
            "load ./script.scm Error",
            "stop_profiler",
            "write_report Profile",
        ]
    );
}

#[test]
fn test_profiler_module_failure_is_fatal() {
    let dir = workdir();
    let rt = RecordingRuntime::new().fail_on("require gosh/vm/profiler");
    let mut l = launcher(rt, &dir);
    assert_eq!(l.run(&args(&["-q", "-ptime", "script.scm"])), 1);
    assert!(!calls(&l).contains(&"start_profiler"));
}

#[test]
fn test_version_and_usage_exit_early() {
    let dir = workdir();
    let mut l = launcher(RecordingRuntime::new(), &dir);
    assert_eq!(l.run(&args(&["-V"])), 0);
    assert_eq!(l.run(&args(&["-Z"])), 1);
    assert_eq!(l.run(&args(&["-fbogus"])), 1);
    assert!(calls(&l).is_empty());
    assert!(l.runtime().settings.is_none());
}

#[test]
fn test_features_reach_runtime() {
    let dir = workdir();
    let mut l = launcher(RecordingRuntime::new(), &dir);
    assert_eq!(l.run(&args(&["-q", "-Fmine", "-fcase-fold", "script.scm"])), 0);
    let settings = l.runtime().settings.as_ref().unwrap();
    assert!(settings.features.contains("mine"));
}

#[test]
fn test_batch_session() {
    let dir = workdir();
    let mut l = launcher(RecordingRuntime::new(), &dir);
    assert_eq!(l.run(&args(&["-q"])), 0);
    assert_eq!(calls(&l), vec!["load_from_reader"]);
    assert_eq!(l.runtime().program_name.as_deref(), Some("gosh"));
    assert!(l.runtime().program_args.is_empty());
}

#[test]
fn test_batch_session_error_exits_1() {
    let dir = workdir();
    let rt = RecordingRuntime::new().fail_on("load_from_reader");
    let mut l = launcher(rt, &dir);
    assert_eq!(l.run(&args(&["-q", "-b"])), 1);
}
