use std::fs;

use serde_json::json;
use tempfile::tempdir;
use ucode::{
    RunConfig, RunRequest, ScriptEngine, SourceHandle, UcodeError, envtree::EnvTree,
    orchestrator,
};

struct Outcome {
    result: Result<(), UcodeError>,
    stdout: String,
    stderr: String,
}

fn run_with(config: RunConfig, env: EnvTree, modules: &[&str], source: &str) -> Outcome {
    let mut engine = ScriptEngine::new(Vec::new(), Vec::new());
    let request = RunRequest {
        config,
        source: SourceHandle::buffer("[test]", source),
        skip_shebang: false,
        env,
        modules: modules.iter().map(|name| name.to_string()).collect(),
    };
    let result = orchestrator::run(&mut engine, request);
    let (out, err) = engine.into_output();
    Outcome {
        result,
        stdout: String::from_utf8(out).expect("utf-8 output"),
        stderr: String::from_utf8(err).expect("utf-8 diagnostics"),
    }
}

fn output(source: &str) -> String {
    let outcome = run_with(RunConfig::default(), EnvTree::new(), &[], source);
    assert!(outcome.result.is_ok(), "script failed: {}", outcome.stderr);
    outcome.stdout
}

fn failure(source: &str) -> Outcome {
    let outcome = run_with(RunConfig::default(), EnvTree::new(), &[], source);
    assert!(outcome.result.is_err(), "script unexpectedly succeeded");
    outcome
}

#[test]
fn evaluates_basic_arithmetic() {
    assert_eq!(
        output(r#"print(1 + 2 * 3, " ", 7 / 2, " ", 6 / 3, " ", 7 % 3, " ", -(2 - 5))"#),
        "7 3.5 2 1 3"
    );
}

#[test]
fn plus_concatenates_when_either_side_is_a_string() {
    assert_eq!(output(r#"print("a" + 1 + 2, " ", 1 + "b")"#), "a12 1b");
}

#[test]
fn logical_operators_short_circuit_and_yield_operands() {
    let source = r#"
        let calls = 0;
        function bump() { calls = calls + 1; return true; }
        let a = false && bump();
        let b = "x" || bump();
        print(a, " ", b, " ", calls, " ", null || "fallback");
    "#;
    assert_eq!(output(source), "false x 0 fallback");
}

#[test]
fn closures_capture_their_defining_scope() {
    let source = r#"
        function counter() {
            let n = 0;
            return function() { n = n + 1; return n; };
        }
        let c = counter();
        c();
        c();
        print(c());
    "#;
    assert_eq!(output(source), "3");
}

#[test]
fn recursive_function_evaluates() {
    let source = r#"
        function fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        print(fib(15));
    "#;
    assert_eq!(output(source), "610");
}

#[test]
fn loops_honour_break_and_continue() {
    let source = r#"
        let sum = 0;
        for (x in [1, 2, 3, 4, 5]) {
            if (x == 2) continue;
            if (x == 5) break;
            sum = sum + x;
        }
        let i = 0;
        while (true) {
            i = i + 1;
            if (i >= 4) break;
        }
        let seen = [];
        for (k in {a: 1, b: 2}) push(seen, k);
        print(sum, " ", i, " ", join(",", seen));
    "#;
    assert_eq!(output(source), "8 4 a,b");
}

#[test]
fn objects_and_arrays_are_shared_and_mutable() {
    let source = r#"
        let o = {list: []};
        let alias = o;
        push(alias.list, 1);
        alias.name = "x";
        o["k"] = 2;
        let arr = [1, 2];
        arr[3] = 4;
        print(o, " ", arr, " ", o == alias, " ", [] == []);
    "#;
    assert_eq!(
        output(source),
        r#"{"list":[1],"name":"x","k":2} [1,2,null,4] true false"#
    );
}

#[test]
fn missing_members_read_as_null() {
    assert_eq!(
        output(r#"let o = {}; print(o.nope, " ", [1][5], " ", "ab"[1])"#),
        "null null b"
    );
}

#[test]
fn field_access_on_null_is_a_runtime_error() {
    let outcome = failure("let o = null;\nprint(o.x);");
    assert!(matches!(outcome.result, Err(UcodeError::Execution(1))));
    assert!(
        outcome
            .stderr
            .starts_with("Runtime error: left-hand side expression is null\nIn [test], line 2")
    );
}

#[test]
fn non_strict_mode_reads_null_and_defines_on_assignment() {
    assert_eq!(
        output(r#"print(type(missing)); fresh = 5; print(" ", fresh)"#),
        "null 5"
    );
}

#[test]
fn strict_mode_rejects_undeclared_variables() {
    let config = RunConfig {
        strict_declarations: true,
        ..RunConfig::default()
    };
    let outcome = run_with(config, EnvTree::new(), &[], "let a = 1;\nprint(b);");
    assert!(matches!(outcome.result, Err(UcodeError::Execution(1))));
    assert!(
        outcome
            .stderr
            .contains("access to undeclared variable b"),
        "stderr was: {}",
        outcome.stderr
    );
    assert!(outcome.stderr.contains("line 2"));
}

#[test]
fn syntax_errors_are_reported_with_location() {
    let outcome = failure("let a = 1;\nlet = 2;");
    let Err(UcodeError::Compile(text)) = outcome.result else {
        panic!("expected compile failure");
    };
    assert_eq!(
        text,
        "Syntax error: expected variable name after `let`\n\
         In [test], line 2, byte 5:\n\n `let = 2;`\n      ^-- Near here\n\n"
    );
    assert!(outcome.stdout.is_empty());
}

#[test]
fn die_reports_runtime_error() {
    let outcome = failure(r#"print("before"); die("boom");"#);
    assert!(matches!(outcome.result, Err(UcodeError::Execution(1))));
    assert_eq!(outcome.stdout, "before");
    assert!(outcome.stderr.starts_with("Runtime error: boom\n"));
}

#[test]
fn builtin_helpers() {
    let source = r#"
        print(length("abc"), length([1, 2]), length({a: 1}), "|");
        print(uc("ab"), lc("CD"), "|");
        print(join("-", split("a,b,c", ",")), "|");
        let j = json('{"a": [1, 2]}');
        print(j.a[1], int("42") + 1, "|");
        print(type([]), type({}), type(1), type(1.5), type("s"), type(print), "|");
        print(exists({a: 1}, "a"), exists({a: 1}, "b"), "|");
        let stack = [1, 2, 3];
        print(pop(stack), length(stack), keys({x: 1, y: 2}), values({x: 1}), "|");
        print(sprintf("%s=%d %J %%", "x", 4.7, [1]));
    "#;
    assert_eq!(
        output(source),
        r#"321|ABcd|a-b-c|243|arrayobjectintdoublestringfunction|truefalse|32["x","y"][1]|x=4 [1] %"#
    );
}

#[test]
fn print_returns_bytes_written() {
    assert_eq!(output(r#"let n = print("abc"); print(n)"#), "abc3");
}

#[test]
fn builtin_modules_resolve_through_require() {
    let source = r#"
        let m = require("math");
        print(m.abs(-3), " ", m.pow(2, 10), " ", m.floor(2.7));
    "#;
    assert_eq!(output(source), "3 1024 2");
}

#[test]
fn preloaded_modules_are_bound_in_root_scope() {
    let outcome = run_with(
        RunConfig::default(),
        EnvTree::new(),
        &["math"],
        "print(math.sqrt(16))",
    );
    assert!(outcome.result.is_ok(), "{}", outcome.stderr);
    assert_eq!(outcome.stdout, "4");
}

#[test]
fn unknown_preload_module_fails_execution() {
    let outcome = run_with(
        RunConfig::default(),
        EnvTree::new(),
        &["nope"],
        r#"print("unreachable")"#,
    );
    assert!(matches!(outcome.result, Err(UcodeError::Execution(1))));
    assert!(outcome.stdout.is_empty());
    assert!(
        outcome
            .stderr
            .contains("No module named 'nope' could be found")
    );
}

#[test]
fn script_modules_load_from_search_path() {
    let dir = tempdir().expect("create temp dir");
    fs::write(
        dir.path().join("helper.uc"),
        "return { twice: function(x) { return x * 2; } };",
    )
    .expect("write module");
    fs::create_dir(dir.path().join("util")).expect("create module dir");
    fs::write(dir.path().join("util/greet.uc"), r#"return "hi";"#).expect("write module");

    let config = RunConfig {
        search_path: format!("/nonexistent/*.so:{}/*.uc", dir.path().display()),
        ..RunConfig::default()
    };
    let source = r#"
        let h = require("helper");
        print(h.twice(21), " ", require("util.greet"), " ", require("helper") == h);
    "#;
    let outcome = run_with(config, EnvTree::new(), &[], source);
    assert!(outcome.result.is_ok(), "{}", outcome.stderr);
    assert_eq!(outcome.stdout, "42 hi true");
}

#[test]
fn environment_is_reachable_directly_and_through_global() {
    let mut env = EnvTree::new();
    env.merge(
        "net",
        json!({"x": 5}).as_object().cloned().expect("object"),
    );
    let outcome = run_with(
        RunConfig::default(),
        env,
        &[],
        r#"print(global.net.x, " ", net.x)"#,
    );
    assert!(outcome.result.is_ok(), "{}", outcome.stderr);
    assert_eq!(outcome.stdout, "5 5");
}

#[test]
fn library_symbols_replace_environment_variables() {
    let mut env = EnvTree::new();
    env.merge(
        "",
        json!({"print": 1, "other": 2}).as_object().cloned().expect("object"),
    );
    let outcome = run_with(
        RunConfig::default(),
        env,
        &[],
        r#"print("ok ", other, " ", type(print))"#,
    );
    assert!(outcome.result.is_ok(), "{}", outcome.stderr);
    assert_eq!(outcome.stdout, "ok 2 function");
}

#[test]
fn search_path_global_keeps_empty_segments() {
    let config = RunConfig {
        search_path: "a::b".to_string(),
        ..RunConfig::default()
    };
    let outcome = run_with(
        config,
        EnvTree::new(),
        &[],
        r#"print(length(REQUIRE_SEARCH_PATH), " ", REQUIRE_SEARCH_PATH[1] == "")"#,
    );
    assert!(outcome.result.is_ok(), "{}", outcome.stderr);
    assert_eq!(outcome.stdout, "3 true");
}

#[test]
fn shebang_skipped_scripts_report_original_line_numbers() {
    let mut engine = ScriptEngine::new(Vec::new(), Vec::new());
    let request = RunRequest {
        config: RunConfig::default(),
        source: SourceHandle::buffer("script.uc", "#!/usr/bin/env ucode\nlet = 1;\n"),
        skip_shebang: true,
        env: EnvTree::new(),
        modules: Vec::new(),
    };
    let Err(UcodeError::Compile(text)) = orchestrator::run(&mut engine, request) else {
        panic!("expected compile failure");
    };
    assert!(text.contains("In script.uc, line 2, byte 5:"), "{text}");
}
