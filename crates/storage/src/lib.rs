// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for Foghorn: the check-result state log and the
//! encrypted secret store.

mod secrets;
mod statelog;

pub use secrets::{
    master_key_from_env, parse_secret_ref, SecretError, SecretStore, MASTER_KEY_ENV,
    SECRET_REF_PREFIX,
};
pub use statelog::{latest_by_check, StateLog, StateLogError, StateRecord};
