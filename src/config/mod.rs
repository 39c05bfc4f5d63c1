//! Configuration module for pgvenv.
//!
//! This module handles parsing, validation, and access to the settings of a
//! run: which server strategy to use, how the server is bound, and how long
//! boot and shutdown may take. Configuration is read from an optional JSON
//! file; every field has a default.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use pgvenv::config::VenvConfig;
//!
//! let config = VenvConfig::from_file("pgvenv.json").unwrap();
//! println!("Connection URI goes to ${}", config.env_var);
//! ```
//!
//! Creating a configuration programmatically:
//! ```
//! use pgvenv::config::{ServerStrategy, VenvConfig, validate_config};
//!
//! let config = VenvConfig {
//!     strategy: ServerStrategy::Raw,
//!     boot_timeout_secs: 30,
//!     ..VenvConfig::default()
//! };
//! validate_config(&config).unwrap();
//! ```
mod parser;
pub mod validator;

pub use parser::{DEFAULT_ENV_VAR, ServerConfig, ServerStrategy, VenvConfig};
pub use validator::validate_config;
