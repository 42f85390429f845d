//! Runtime-agnostic command execution library
//!
//! A small wrapper over `async-process` used to drive container engine CLIs.
//! Commands are described with [`Command`], run to completion with
//! [`Executor::output`], or streamed line by line with
//! [`Executor::spawn_lines`] when the caller wants progress as it happens.

#![warn(missing_docs)]

pub mod command;
pub mod error;
pub mod executor;
pub mod process;

pub use command::Command;
pub use error::{Error, Result};
pub use executor::Executor;
pub use process::{ExitStatus, LineStream, ProcessOutput};
