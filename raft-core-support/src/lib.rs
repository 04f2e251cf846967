//! Cross-cutting support shared by the raft core: error types and logger
//! bootstrap. Split out of the protocol crate so both it and any future
//! host-side driver crate can depend on the same `Result`/`Logger` without
//! pulling in Raft-specific types.

#[macro_use]
extern crate slog;

pub mod error;
pub mod logger;
