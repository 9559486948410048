use std::{fmt, io};

use thiserror::Error;

/// Represents a byte span within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Classification of a diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Runtime,
}

impl DiagnosticKind {
    fn heading(&self) -> &'static str {
        match self {
            DiagnosticKind::Lexer | DiagnosticKind::Parser => "Syntax error",
            DiagnosticKind::Runtime => "Runtime error",
        }
    }
}

/// Engine-side diagnostic: what went wrong and, when known, where.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Runtime, message)
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Formats the diagnostic against the text it was produced from.
    ///
    /// `context.first_line` is the line number of the first byte of
    /// `context.text`, which is greater than one when a shebang line was
    /// consumed before compilation.
    pub fn render(&self, context: &SourceContext<'_>) -> String {
        let mut rendered = format!("{}: {}\n", self.kind.heading(), self.message);
        if let Some(span) = self.span {
            let start = span.start.min(context.text.len());
            let line_start = context.text[..start].rfind('\n').map_or(0, |idx| idx + 1);
            let line_end = context.text[start..]
                .find('\n')
                .map_or(context.text.len(), |idx| start + idx);
            let line = context.first_line + context.text[..start].matches('\n').count();
            let column = start - line_start + 1;
            rendered.push_str(&format!(
                "In {}, line {line}, byte {column}:\n\n `{}`\n  {}^-- Near here\n",
                context.name,
                &context.text[line_start..line_end],
                " ".repeat(column - 1),
            ));
        }
        for note in &self.notes {
            rendered.push_str(&format!("  note: {note}\n"));
        }
        rendered.push('\n');
        rendered
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.heading(), self.message)?;
        if let Some(span) = self.span {
            write!(f, " ({}..{})", span.start, span.end)?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Source text a diagnostic refers to.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    pub name: &'a str,
    pub text: &'a str,
    pub first_line: usize,
}

/// Unified error type for the ucode front end.
#[derive(Debug, Error)]
pub enum UcodeError {
    #[error("{0}")]
    Usage(String),
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Option -{flag} must point to a valid JSON object: {detail}")]
    Environment { flag: char, detail: String },
    #[error("{0}")]
    Compile(String),
    #[error("script execution failed with status {0}")]
    Execution(i32),
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl UcodeError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            UcodeError::Compile(_) => 2,
            _ => 1,
        }
    }
}

/// Writes the user-facing text for `err`.
///
/// Compile diagnostics come from the engine and are written verbatim.
/// Execution failures write nothing; the engine reports its own runtime errors.
pub fn report(err: &UcodeError, stream: &mut dyn io::Write) -> io::Result<()> {
    match err {
        UcodeError::Compile(text) => stream.write_all(text.as_bytes()),
        UcodeError::Execution(_) => Ok(()),
        other => writeln!(stream, "{other}"),
    }
}

pub type Result<T> = std::result::Result<T, UcodeError>;
