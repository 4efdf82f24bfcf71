// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foghorn-config: YAML configuration loading and validation.
//!
//! A config file is a YAML stream: documents with a `name` key are
//! single checks, any other document is a global section. Later global
//! documents merge over earlier ones; checks accumulate in order.

mod loader;

pub use loader::{load, load_str, uses_secrets, Config, ConfigError};
