//! Common utilities and shared types for the admissions portal.
//!
//! This crate provides foundational components used across all workspace crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based identifiers and application numbers via [`IdGenerator`]
//! - **Storage**: Blob storage backends for uploaded documents
//!
//! # Example
//!
//! ```no_run
//! use admissions_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let number = id_gen.generate_application_number(&config.application.number_prefix);
//!     println!("Generated application number: {}", number);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{LocalStorage, StorageBackend, StoredFile, generate_document_key};
