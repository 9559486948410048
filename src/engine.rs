//! The compile/initialise/execute interface the front end drives, and the
//! bundled tree-walking engine that implements it.

use std::io::{self, Write};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
    ast::Stmt,
    config::RunConfig,
    diagnostics::{Diagnostic, SourceContext},
    parser,
    runtime::Interpreter,
    scope::Scope,
    source::SourceHandle,
    stdlib,
    value::Value,
};

/// A script engine as seen by the orchestrator.
pub trait Engine {
    /// Compiled entry point.
    type Program;

    /// Compiles the remainder of `source`; failures carry the complete,
    /// already formatted diagnostic text.
    fn compile(
        &mut self,
        config: &RunConfig,
        source: &mut SourceHandle,
    ) -> Result<Self::Program, String>;

    /// Registers library symbols in the global scope. Runs after the
    /// environment variables are in place, so same-named symbols replace them.
    fn init_globals(&mut self, globals: &Scope<'_>);

    /// Runs `program` against `root` after preloading `modules`; returns the
    /// process-style status, zero on success.
    fn execute(&mut self, program: &Self::Program, root: &Scope<'_>, modules: &[String]) -> i32;
}

/// A parsed script together with the text its diagnostics point into.
#[derive(Debug)]
pub struct Program {
    name: String,
    text: String,
    first_line: usize,
    body: Vec<Stmt>,
    strict: bool,
}

impl Program {
    fn context(&self) -> SourceContext<'_> {
        SourceContext {
            name: &self.name,
            text: &self.text,
            first_line: self.first_line,
        }
    }
}

/// Engine writing script output to `O` and diagnostics to `E`.
pub struct ScriptEngine<O, E> {
    out: O,
    err: E,
    modules: IndexMap<String, Value>,
}

impl ScriptEngine<io::Stdout, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> ScriptEngine<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            modules: IndexMap::new(),
        }
    }

    pub fn into_output(self) -> (O, E) {
        (self.out, self.err)
    }

    fn report(&mut self, diagnostic: &Diagnostic, program: &Program) {
        let rendered = diagnostic.render(&program.context());
        if let Err(err) = self.err.write_all(rendered.as_bytes()) {
            warn!(%err, "unable to write runtime diagnostic");
        }
    }
}

impl<O: Write, E: Write> Engine for ScriptEngine<O, E> {
    type Program = Program;

    fn compile(
        &mut self,
        config: &RunConfig,
        source: &mut SourceHandle,
    ) -> Result<Program, String> {
        let text = source
            .read_text()
            .map_err(|err| format!("Failed to read {}: {err}\n", source.name()))?;
        debug!(
            source = source.name(),
            bytes = text.len(),
            lstrip_blocks = config.lstrip_blocks,
            trim_blocks = config.trim_blocks,
            "compiling"
        );

        let context = SourceContext {
            name: source.name(),
            text: &text,
            first_line: source.first_line(),
        };
        let body = parser::parse_program(&text).map_err(|err| err.render(&context))?;

        Ok(Program {
            name: source.name().to_string(),
            first_line: source.first_line(),
            text,
            body,
            strict: config.strict_declarations,
        })
    }

    fn init_globals(&mut self, globals: &Scope<'_>) {
        stdlib::install(globals);
    }

    fn execute(&mut self, program: &Program, root: &Scope<'_>, modules: &[String]) -> i32 {
        let outcome = {
            let mut interpreter =
                Interpreter::new(root, &mut self.out, program.strict, &mut self.modules);
            preload(&mut interpreter, root, modules)
                .and_then(|()| interpreter.run(&program.body))
        };

        if let Err(err) = self.out.flush() {
            warn!(%err, "unable to flush script output");
        }

        match outcome {
            Ok(_) => 0,
            Err(diagnostic) => {
                debug!(message = %diagnostic.message, "script failed");
                self.report(&diagnostic, program);
                1
            }
        }
    }
}

fn preload(
    interpreter: &mut Interpreter<'_>,
    root: &Scope<'_>,
    modules: &[String],
) -> Result<(), Diagnostic> {
    for name in modules {
        let module = interpreter.require(name)?;
        root.define(name.as_str(), module);
    }
    Ok(())
}
