//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the Drive service:
//! - Configuration management ([`config::CoreConfig`], [`config::MimeTable`])
//! - Logging and tracing setup ([`logging::init_logging`])
//!
//! Every other service crate receives its settings and bridges through
//! [`config::CoreConfig`].

pub mod config;
pub mod error;
pub mod logging;
mod mime;

pub use error::{Error, Result};
