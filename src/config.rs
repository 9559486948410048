//! Run configuration shared by the option parser, the orchestrator and the
//! engine.

/// Colon-delimited module search path seeded into `REQUIRE_SEARCH_PATH`.
///
/// Packagers override it at build time through `UCODE_LIB_SEARCH_PATH`.
pub const LIB_SEARCH_PATH: &str = match option_env!("UCODE_LIB_SEARCH_PATH") {
    Some(path) => path,
    None => "/usr/local/lib/ucode/*.so:/usr/local/share/ucode/*.uc:./*.so:./*.uc",
};

/// Global holding the module search patterns, one array entry per segment.
pub const SEARCH_PATH_GLOBAL: &str = "REQUIRE_SEARCH_PATH";

/// Parser configuration handed to the engine's compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub strict_declarations: bool,
    pub lstrip_blocks: bool,
    pub trim_blocks: bool,
    pub search_path: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strict_declarations: false,
            lstrip_blocks: true,
            trim_blocks: true,
            search_path: LIB_SEARCH_PATH.to_string(),
        }
    }
}
