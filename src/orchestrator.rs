use tracing::debug;

use crate::{
    config::SEARCH_PATH_GLOBAL,
    diagnostics::{Result, UcodeError},
    engine::Engine,
    envtree::sanitize_identifier,
    options::RunRequest,
    scope::Scope,
    value::Value,
};

/// Splits a colon-delimited search path, keeping empty segments.
pub fn split_search_path(path: &str) -> Vec<String> {
    path.split(':').map(str::to_string).collect()
}

/// Drives `engine` through one execution.
///
/// The global scope receives, in order, the search path, the environment
/// variables and the engine's library symbols, so a library symbol replaces
/// an environment variable of the same name. The root scope is a child of
/// the global scope and is dropped first.
pub fn run<E: Engine>(engine: &mut E, request: RunRequest) -> Result<()> {
    let RunRequest {
        config,
        mut source,
        skip_shebang,
        env,
        modules,
    } = request;

    if skip_shebang {
        source.skip_shebang()?;
    }

    let program = engine
        .compile(&config, &mut source)
        .map_err(UcodeError::Compile)?;
    debug!(source = source.name(), "compiled");
    drop(source);

    let globals = Scope::global();
    let search_path = split_search_path(&config.search_path)
        .into_iter()
        .map(Value::string)
        .collect();
    globals.define(SEARCH_PATH_GLOBAL, Value::array(search_path));

    if let Some(variables) = env.into_map() {
        debug!(count = variables.len(), "injecting environment variables");
        for (key, value) in variables {
            globals.define(sanitize_identifier(&key), Value::from_json(value));
        }
    }

    engine.init_globals(&globals);

    let status = {
        let root = Scope::child(&globals);
        root.define("global", globals.object());
        engine.execute(&program, &root, &modules)
    };
    drop(globals);
    debug!(status, "execution finished");

    if status != 0 {
        return Err(UcodeError::Execution(status));
    }
    Ok(())
}
