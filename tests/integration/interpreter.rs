//! The launcher driving the reference interpreter in-process

use std::cell::RefCell;
use std::fs;
use std::io::{self, Cursor, Write};
use std::rc::Rc;

use gosh::launcher::ScriptResolver;
use gosh::{Interpreter, Launcher};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Captured {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn run(
    dir: &TempDir,
    args: &[&str],
    stdin: &str,
) -> (i32, String) {
    let out = Captured::default();
    let interpreter = Interpreter::with_output(Box::new(out.clone()));
    let mut launcher = Launcher::new(interpreter)
        .with_resolver(ScriptResolver::new().with_base(dir.path()))
        .with_input(Box::new(Cursor::new(stdin.as_bytes().to_vec())), false);
    let argv: Vec<String> = std::iter::once("gosh")
        .chain(args.iter().copied())
        .map(String::from)
        .collect();
    let status = launcher.run(&argv);
    (status, out.text())
}

#[test]
fn test_interleaved_actions_against_interpreter() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("lib")).unwrap();
    fs::write(dir.path().join("lib/greet.scm"), "(define greeting \"hi\")").unwrap();
    let lib = dir.path().join("lib");
    let lib = lib.to_string_lossy();

    let (status, out) = run(
        &dir,
        &["-q", "-e", "(display 0)", "-I", &lib, "-lgreet", "-E", "display greeting"],
        "",
    );
    assert_eq!(status, 0);
    assert_eq!(out, "0hi");
}

#[test]
fn test_load_before_path_fails() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("lib")).unwrap();
    fs::write(dir.path().join("lib/greet.scm"), "(define greeting \"hi\")").unwrap();
    let lib = dir.path().join("lib");
    let lib = lib.to_string_lossy();

    // the load path is only extended when -I is reached
    let (status, _) = run(&dir, &["-q", "-lgreet", "-I", &lib], "");
    assert_eq!(status, 1);
}

#[test]
fn test_script_main_receives_rest_args() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("sum.scm");
    fs::write(
        &script,
        "(define (main args) (display (apply string-append args)) (length args))",
    )
    .unwrap();
    let script = script.to_string_lossy();

    let (status, out) = run(&dir, &["-q", &script, "a", "b"], "");
    assert_eq!(status, 2);
    assert_eq!(out, "ab");
}

#[test]
fn test_batch_session_uses_interactive_helpers() {
    let dir = TempDir::new().unwrap();
    let (status, out) = run(&dir, &["-b"], "(apropos \"string-len\")\n");
    assert_eq!(status, 0);
    assert_eq!(out, "string-length\n");
}
