//! Invocation front end for the ucode scripting language.
//!
//! Turns a command line into an execution request (`options`, `stdin`,
//! `envtree`) and drives an [`Engine`] through compile, global
//! initialisation and execution (`orchestrator`). A small tree-walking
//! engine ships alongside so the binary can run scripts on its own.

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod environment;
pub mod envtree;
pub mod lexer;
pub mod logging;
pub mod options;
pub mod orchestrator;
pub mod parser;
pub mod runtime;
pub mod scope;
pub mod source;
pub mod stdin;
pub mod stdlib;
pub mod value;

pub use config::RunConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, SourceSpan, UcodeError};
pub use engine::{Engine, ScriptEngine};
pub use options::{Invocation, Options, RunRequest};
pub use scope::Scope;
pub use source::SourceHandle;
pub use stdin::StdinAcquirer;
