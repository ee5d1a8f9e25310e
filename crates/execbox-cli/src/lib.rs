//! Building blocks of the `execbox` command: turning a source file into an
//! execution request and talking to a remote executor service.

pub mod remote;
pub mod source;

pub use remote::RemoteExecutor;
pub use source::{exit_status, infer_runtime, parse_input, SourceFile};
