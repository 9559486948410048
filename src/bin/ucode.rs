use std::{
    ffi::OsString,
    io::{self, Write},
    process::ExitCode,
};

use ucode::{
    Invocation, Options, ScriptEngine, StdinAcquirer, UcodeError,
    diagnostics::report,
    logging, options::usage, orchestrator,
};

fn main() -> ExitCode {
    logging::init();

    let args: Vec<OsString> = std::env::args_os().collect();
    let app = args
        .first()
        .map(|arg| arg.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ucode".to_string());

    let options = match Options::parse_from(args) {
        Ok(Invocation::Help) => {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(usage(&app).as_bytes());
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Run(options)) => options,
        Err(err) => return fail(&err),
    };

    for warning in &options.warnings {
        eprintln!("{warning}");
    }

    let mut stdin = StdinAcquirer::new(io::stdin().lock());
    let result = options.resolve(&mut stdin).and_then(|request| {
        let mut engine = ScriptEngine::stdio();
        orchestrator::run(&mut engine, request)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(&err),
    }
}

fn fail(err: &UcodeError) -> ExitCode {
    let mut stderr = io::stderr().lock();
    let _ = report(err, &mut stderr);
    ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
}
