//! Database access layer for idrec-identify

pub mod contacts;

pub use idrec_common::db::{connect_in_memory, init_database};
