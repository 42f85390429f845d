//! Runtime-agnostic async utilities
//!
//! The container harness never spawns tasks of its own, but it does need to
//! wait: between readiness checks, until a cancellation deadline, and around
//! engine calls that may hang. This crate provides those timers without
//! coupling callers to a specific runtime.
//!
//! Exactly one runtime feature (`smol`, `tokio` or `async-std`) selects the
//! timer backend (`smol` by default). When several are enabled the first in
//! that order wins.
//!
//! # Examples
//!
//! ```no_run
//! use async_runtime_compat::{sleep, timeout};
//! use std::time::Duration;
//!
//! # #[cfg(feature = "smol")]
//! smol::block_on(async {
//!     sleep(Duration::from_millis(10)).await;
//!     let late = timeout(Duration::from_millis(10), sleep(Duration::from_secs(5))).await;
//!     assert!(late.is_err());
//! });
//! ```

#![warn(missing_docs)]

pub mod runtime_utils;

pub use runtime_utils::{Elapsed, sleep, sleep_until, timeout};
