//! # idrec Common Library
//!
//! Shared code for the identity reconciliation services:
//! - Contact record model
//! - Database initialization and schema
//! - Bootstrap configuration loading
//! - Error types and timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
