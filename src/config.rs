// ABOUTME: Constants and environment configuration for the interpreter drivers

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const BANNER: &str = "? --- interactive repl ---";
pub const BANNER_HINT: &str = "? results are prefixed with > and errors with !";
pub const BANNER_EXAMPLE: &str = "? try typing (($lambda (a b) (+ a b)) 1 2)";

/// The prelude is taken from the working directory when present, so
/// users can override the embedded copy.
pub const PRELUDE_FILE: &str = "std.lisp";
pub const DEFAULT_PRELUDE: &str = include_str!("../std.lisp");

/// Free-form tuning string for the optional tracing JIT. This build
/// carries no JIT, so the value is logged and otherwise ignored;
/// absence disables tuning overrides.
pub const JIT_CONFIG_VAR: &str = "RFEXPROTO_JIT_CONFIG";

pub fn jit_config() -> Option<String> {
    std::env::var(JIT_CONFIG_VAR).ok()
}
