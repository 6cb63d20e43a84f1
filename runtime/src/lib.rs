pub mod bindings;
pub mod config;
pub mod error;
pub mod render;
pub mod result;
pub mod sandbox;
pub mod session;
pub mod store;

pub use config::RuntimeConfig;
pub use error::{ConfigError, SandboxError, SessionError};
pub use result::ExecutionResult;
pub use sandbox::Sandbox;
pub use session::Session;
pub use store::{ContextStore, InputSnapshot, Timestamp};
