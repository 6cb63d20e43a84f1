use std::path::PathBuf;

use thiserror::Error;

/// Failures inside a single sandboxed execution. These never leave the
/// engine: they are folded into `ExecutionResult::error`.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to create sandbox: {0}")]
    Init(#[source] rquickjs::Error),
    #[error("failed to prepare sandbox globals: {0}")]
    Host(#[source] rquickjs::Error),
    #[error("sandbox VM used after it was released")]
    Released,
    /// The script threw. Carries the stringified thrown value.
    #[error("{0}")]
    Script(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors from driving a session by directive id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no text input with id `{0}`")]
    UnknownInput(String),
    #[error("no button dispatches event `{0}`")]
    UnknownEvent(String),
}
