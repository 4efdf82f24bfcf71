// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for external I/O: the container runtime and the image
//! registry.

pub mod registry;
pub mod runtime;
pub mod subprocess;

pub use registry::{RegistryError, RegistryTagLister, TagLister};
pub use runtime::{ContainerRuntime, ContainerSpec, DockerCli, RuntimeError};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use registry::FakeTagLister;
#[cfg(any(test, feature = "test-support"))]
pub use runtime::{FakeRuntime, RuntimeCall};
