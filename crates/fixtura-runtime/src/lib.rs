//! Container engine access for fixtura.
//!
//! The [`engine::Engine`] is the explicit connection object every fixture
//! operation goes through. It wraps a [`backend::ContainerBackend`], which is
//! either the Docker CLI backend or the in-memory simulation used by tests.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod engine;
pub mod image;
pub mod inspect;
