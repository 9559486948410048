//! Command-line parsing and input acquisition.
//!
//! Parsing is pure: it only records what was asked for. `Options::resolve`
//! then opens files, drains standard input and folds environment payloads,
//! visiting the staged inputs in command-line order.

use std::{ffi::OsString, io::Read, path::Path};

use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use tracing::{debug, warn};

use crate::{
    config::RunConfig,
    diagnostics::{Result, UcodeError},
    envtree::{EnvTree, parse_env_payload, split_prefix},
    source::SourceHandle,
    stdin::StdinAcquirer,
};

/// Display name of inline `-s` scripts.
pub const INLINE_SOURCE_NAME: &str = "[-s argument]";

const EXCLUSIVE_SOURCES: &str = "Options -i and -s are exclusive";
const MISSING_SOURCE: &str = "One of -i or -s is required";
const IGNORED_DUMP: &str = "Option -d is not supported, ignoring";

/// Short flags that take a value, as separate or attached argument.
const VALUE_FLAGS: [char; 5] = ['i', 's', 'e', 'E', 'm'];

#[derive(Debug, Parser)]
#[command(
    name = "ucode",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    help: bool,

    #[arg(short = 'i', value_name = "file")]
    input: Vec<String>,

    #[arg(short = 's', value_name = "script", allow_hyphen_values = true)]
    script: Vec<String>,

    #[arg(short = 'd', action = ArgAction::Count, hide = true)]
    dump: u8,

    #[arg(short = 'l', action = ArgAction::Count)]
    keep_leading_whitespace: u8,

    #[arg(short = 'r', action = ArgAction::Count)]
    keep_trailing_newlines: u8,

    #[arg(short = 'S', action = ArgAction::Count)]
    strict: u8,

    #[arg(short = 'e', value_name = "[prefix=]json")]
    env: Vec<String>,

    #[arg(short = 'E', value_name = "[prefix=]file")]
    env_file: Vec<String>,

    #[arg(short = 'm', value_name = "module")]
    module: Vec<String>,

    #[arg(value_name = "path")]
    paths: Vec<String>,
}

/// Where the main script comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    File(String),
    Stdin,
    Inline(String),
}

/// One `-e`/`-E` occurrence, split into prefix and payload.
///
/// For `-e` the payload is JSON text; for `-E` it is a path or `-`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSpec {
    pub flag: char,
    pub prefix: String,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staged {
    Source(SourceSpec),
    Env(EnvSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Help,
    Run(Options),
}

/// Everything the command line asked for, before any input is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub config: RunConfig,
    pub staged: Vec<Staged>,
    pub script_path: Option<String>,
    pub modules: Vec<String>,
    pub warnings: Vec<String>,
}

/// A fully acquired execution request.
#[derive(Debug)]
pub struct RunRequest {
    pub config: RunConfig,
    pub source: SourceHandle,
    pub skip_shebang: bool,
    pub env: EnvTree,
    pub modules: Vec<String>,
}

impl Options {
    /// Parses `args`, program name first.
    pub fn parse_from<I, T>(args: I) -> Result<Invocation>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        if args.len() <= 1 || requests_help(&args) {
            return Ok(Invocation::Help);
        }

        let matches = Cli::command()
            .try_get_matches_from(&args)
            .map_err(|err| UcodeError::Usage(err.to_string().trim_end().to_string()))?;
        let cli = Cli::from_arg_matches(&matches)
            .map_err(|err| UcodeError::Usage(err.to_string().trim_end().to_string()))?;
        if cli.help {
            return Ok(Invocation::Help);
        }

        let staged = stage_in_order(&matches, &cli);
        let selections = staged
            .iter()
            .filter(|input| matches!(input, Staged::Source(_)))
            .count();
        let mut warnings: Vec<String> = (1..selections)
            .map(|_| EXCLUSIVE_SOURCES.to_string())
            .collect();
        if cli.dump > 0 {
            warnings.push(IGNORED_DUMP.to_string());
        }
        for warning in &warnings {
            warn!("{warning}");
        }

        let config = RunConfig {
            strict_declarations: cli.strict > 0,
            lstrip_blocks: cli.keep_leading_whitespace == 0,
            trim_blocks: cli.keep_trailing_newlines == 0,
            ..RunConfig::default()
        };
        debug!(?config, inputs = staged.len(), "parsed command line");

        Ok(Invocation::Run(Self {
            config,
            staged,
            script_path: cli.paths.into_iter().next(),
            modules: cli.module,
            warnings,
        }))
    }

    /// The selection that wins: the last `-i`/`-s`, else the positional path.
    pub fn effective_source(&self) -> Option<SourceSpec> {
        self.staged
            .iter()
            .rev()
            .find_map(|input| match input {
                Staged::Source(spec) => Some(spec.clone()),
                Staged::Env(_) => None,
            })
            .or_else(|| self.script_path.clone().map(SourceSpec::File))
    }

    /// Opens every staged input in command-line order and builds the request.
    ///
    /// Overridden `-i` selections are still opened, so a missing file or a
    /// second stdin consumer fails even when a later selection wins.
    pub fn resolve<R: Read>(self, stdin: &mut StdinAcquirer<R>) -> Result<RunRequest> {
        let mut source = None;
        let mut env = EnvTree::new();

        for input in self.staged {
            match input {
                Staged::Source(spec) => source = Some(open_source(spec, stdin)?),
                Staged::Env(spec) => {
                    let object = load_env(&spec, stdin)?;
                    env.merge(&spec.prefix, object);
                }
            }
        }

        let (source, skip_shebang) = match (source, self.script_path) {
            (Some(source), _) => (source, false),
            (None, Some(path)) => (open_file(&path)?, true),
            (None, None) => return Err(UcodeError::Usage(MISSING_SOURCE.to_string())),
        };
        debug!(source = source.name(), skip_shebang, "resolved inputs");

        Ok(RunRequest {
            config: self.config,
            source,
            skip_shebang,
            env,
            modules: self.modules,
        })
    }
}

/// Looks for `-h`/`--help` the way getopt reaches it, so a help request wins
/// over anything later on the line that clap would reject.
fn requests_help(args: &[OsString]) -> bool {
    let mut rest = args.iter().skip(1).map(|arg| arg.to_string_lossy());
    while let Some(arg) = rest.next() {
        if arg == "--" {
            return false;
        }
        if arg == "--help" {
            return true;
        }
        let Some(cluster) = arg.strip_prefix('-') else {
            continue;
        };
        for (at, flag) in cluster.char_indices() {
            if flag == 'h' {
                return true;
            }
            if VALUE_FLAGS.contains(&flag) {
                if at + flag.len_utf8() == cluster.len() {
                    rest.next();
                }
                break;
            }
        }
    }
    false
}

/// Rebuilds the interleaving of `-i`, `-s`, `-e` and `-E` from clap's indices.
fn stage_in_order(matches: &ArgMatches, cli: &Cli) -> Vec<Staged> {
    let mut ordered = Vec::new();
    let groups = [
        ("input", &cli.input),
        ("script", &cli.script),
        ("env", &cli.env),
        ("env_file", &cli.env_file),
    ];
    for (id, values) in groups {
        let Some(indices) = matches.indices_of(id) else {
            continue;
        };
        for (index, value) in indices.zip(values) {
            let input = match id {
                "input" if value == "-" => Staged::Source(SourceSpec::Stdin),
                "input" => Staged::Source(SourceSpec::File(value.clone())),
                "script" => Staged::Source(SourceSpec::Inline(value.clone())),
                "env" => env_spec('e', value),
                _ => env_spec('E', value),
            };
            ordered.push((index, input));
        }
    }

    ordered.sort_by_key(|(index, _)| *index);
    ordered.into_iter().map(|(_, input)| input).collect()
}

fn env_spec(flag: char, argument: &str) -> Staged {
    let (prefix, payload) = split_prefix(argument);
    Staged::Env(EnvSpec {
        flag,
        prefix: prefix.to_string(),
        payload: payload.to_string(),
    })
}

fn open_file(path: &str) -> Result<SourceHandle> {
    SourceHandle::file(path).map_err(|source| UcodeError::Open {
        path: path.to_string(),
        source,
    })
}

fn open_stdin<R: Read>(stdin: &mut StdinAcquirer<R>) -> Result<SourceHandle> {
    stdin.acquire().map_err(|source| UcodeError::Open {
        path: "-".to_string(),
        source,
    })
}

fn open_source<R: Read>(spec: SourceSpec, stdin: &mut StdinAcquirer<R>) -> Result<SourceHandle> {
    match spec {
        SourceSpec::File(path) => open_file(&path),
        SourceSpec::Stdin => open_stdin(stdin),
        SourceSpec::Inline(text) => Ok(SourceHandle::buffer(INLINE_SOURCE_NAME, text)),
    }
}

fn load_env<R: Read>(
    spec: &EnvSpec,
    stdin: &mut StdinAcquirer<R>,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    if spec.flag == 'e' {
        return parse_env_payload(spec.payload.as_bytes(), spec.flag);
    }
    let handle = if spec.payload == "-" {
        open_stdin(stdin)?
    } else {
        open_file(&spec.payload)?
    };
    parse_env_payload(handle, spec.flag)
}

/// Usage text printed for `-h`, `--help` and a bare invocation.
pub fn usage(app: &str) -> String {
    let app = Path::new(app)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| app.to_string());
    format!(
        "== Usage ==\n\n  # {app} [-l] [-r] [-S] [-e '[prefix=]{{\"var\": ...}}'] \
         [-E [prefix=]env.json] {{-i <file> | -s \"ucode script...\"}} [-m module]... [path]\n\
         \x20 -h, --help\tPrint this help\n\
         \x20 -i file\tSpecify an ucode script to parse\n\
         \x20 -s \"ucode script...\"\tSpecify an ucode fragment to parse\n\
         \x20 -l Do not strip leading block whitespace\n\
         \x20 -r Do not trim trailing block newlines\n\
         \x20 -S Enable strict mode\n\
         \x20 -e Set global variables from given JSON object\n\
         \x20 -E Set global variables from given JSON file\n\
         \x20 -m Preload given module\n"
    )
}
