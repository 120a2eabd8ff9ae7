//! Kiln Core
//!
//! Core types shared by the Kiln configuration converter.
//!
//! This crate contains the domain types the host hands to the converter:
//! repository and build descriptors, the inline configuration file, optional
//! templates and their free-form data.

pub mod domain;

pub use domain::build::{Build, BuildEvent};
pub use domain::convert::{ConfigFile, ConvertRequest};
pub use domain::repo::Repository;
pub use domain::template::{Template, TemplateData};
