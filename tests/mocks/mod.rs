//! Test doubles shared by the integration tests

#![allow(dead_code)]

pub mod mock_collaborators;

pub use mock_collaborators::*;
