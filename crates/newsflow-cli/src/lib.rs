//! News Flow CLI: command implementations shared by the `newsflow` binary
//! and its integration tests.

pub mod commands;
