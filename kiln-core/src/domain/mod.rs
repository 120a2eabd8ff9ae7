//! Core domain types
//!
//! These structures describe what the CI host knows about a repository and a
//! build at the moment a configuration file has to be produced. They are
//! read-only to the converter.

pub mod build;
pub mod convert;
pub mod repo;
pub mod template;
