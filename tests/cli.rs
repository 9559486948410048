use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn ucode() -> Command {
    let mut cmd = Command::cargo_bin("ucode").expect("binary exists");
    cmd.env_remove("UCODE_LOG");
    cmd
}

#[test]
fn inline_script_runs() {
    ucode().args(["-s", "return 1+1;"]).assert().success();
}

#[test]
fn syntax_error_exits_with_two() {
    ucode()
        .args(["-s", "{"])
        .assert()
        .code(2)
        .stderr(predicate::str::starts_with(
            "Syntax error: expected `}` to close block\nIn [-s argument], line 1, byte 2:",
        ));
}

#[test]
fn environment_reaches_script_through_global() {
    ucode()
        .args(["-e", r#"net={"x":5}"#, "-s", "print(global.net.x)"])
        .assert()
        .success()
        .stdout("5");
}

#[test]
fn no_arguments_prints_usage() {
    ucode()
        .assert()
        .success()
        .stdout(predicate::str::starts_with("== Usage ==\n"));
}

#[test]
fn help_flag_prints_usage() {
    ucode()
        .args(["-s", "print(1)", "-h"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-S Enable strict mode"));
}

#[test]
fn last_source_selection_wins() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("file.uc");
    fs::write(&script, r#"print("from file")"#).expect("write script");

    ucode()
        .arg("-i")
        .arg(&script)
        .args(["-s", r#"print("inline")"#])
        .assert()
        .success()
        .stdout("inline")
        .stderr(predicate::str::contains("Options -i and -s are exclusive"));
}

#[test]
fn positional_script_skips_shebang() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("tool.uc");
    fs::write(
        &script,
        "#!/usr/bin/env ucode\nprint(\"shebang ok\");\n",
    )
    .expect("write script");

    ucode()
        .arg(&script)
        .assert()
        .success()
        .stdout("shebang ok");
}

#[test]
fn explicit_file_source_keeps_shebang() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("tool.uc");
    fs::write(&script, "#!/usr/bin/env ucode\nprint(1);\n").expect("write script");

    ucode()
        .arg("-i")
        .arg(&script)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Syntax error"));
}

#[test]
fn environment_file_from_stdin() {
    ucode()
        .args(["-E", "-", "-s", r#"print("hello ", name)"#])
        .write_stdin(r#"{"name": "world"}"#)
        .assert()
        .success()
        .stdout("hello world");
}

#[test]
fn script_from_stdin() {
    ucode()
        .args(["-i", "-"])
        .write_stdin(r#"print(uc("piped"))"#)
        .assert()
        .success()
        .stdout("PIPED");
}

#[test]
fn stdin_cannot_be_read_twice() {
    ucode()
        .args(["-i", "-", "-E", "-"])
        .write_stdin("print(1)")
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("can read from stdin only once"));
}

#[test]
fn invalid_environment_is_rejected() {
    ucode()
        .args(["-e", "[1,2]", "-s", "print(1)"])
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::starts_with(
            "Option -e must point to a valid JSON object",
        ));
}

#[test]
fn missing_source_is_a_usage_error() {
    ucode()
        .args(["-l", "-r", "-S"])
        .assert()
        .code(1)
        .stderr("One of -i or -s is required\n");
}

#[test]
fn unopenable_file_is_reported() {
    ucode()
        .args(["-i", "/nonexistent/ucode/script.uc"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with(
            "Failed to open /nonexistent/ucode/script.uc: ",
        ));
}

#[test]
fn unknown_flag_is_rejected() {
    ucode().args(["-x", "-s", "print(1)"]).assert().code(1);
}

#[test]
fn dump_flag_is_ignored() {
    ucode()
        .args(["-d", "-s", "print(1)"])
        .assert()
        .success()
        .stdout("1")
        .stderr(predicate::str::contains("Option -d is not supported"));
}

#[test]
fn help_stops_before_invalid_arguments() {
    ucode()
        .args(["-h", "-x"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("== Usage ==\n"));
}

#[test]
fn strict_mode_fails_on_undeclared_names() {
    ucode()
        .args(["-S", "-s", "print(nope)"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("access to undeclared variable nope"));
}

#[test]
fn runtime_errors_exit_with_one() {
    ucode()
        .args(["-s", r#"print("partial"); die("boom")"#])
        .assert()
        .code(1)
        .stdout("partial")
        .stderr(predicate::str::starts_with("Runtime error: boom\n"));
}

#[test]
fn preloaded_module_is_available() {
    ucode()
        .args(["-m", "math", "-s", "print(math.sqrt(16))"])
        .assert()
        .success()
        .stdout("4");
}

#[test]
fn deeply_nested_source_is_a_syntax_error() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("deep.uc");
    fs::write(&script, format!("{}1{}", "(".repeat(3000), ")".repeat(3000)))
        .expect("write script");

    ucode()
        .arg("-i")
        .arg(&script)
        .assert()
        .code(2)
        .stdout("")
        .stderr(predicate::str::starts_with("Syntax error: too deeply nested\n"));
}

#[test]
fn nesting_limit_covers_blocks_and_unary_chains() {
    for script in [
        format!("{}{}", "{".repeat(3000), "}".repeat(3000)),
        format!("print({}1)", "!".repeat(3000)),
        format!("x = {}[]{}", "[".repeat(3000), "]".repeat(3000)),
    ] {
        ucode()
            .args(["-s", &script])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("too deeply nested"));
    }
}

#[test]
fn moderate_nesting_still_runs() {
    let script = format!("print({}7{})", "(".repeat(100), ")".repeat(100));
    ucode().args(["-s", &script]).assert().success().stdout("7");
}
