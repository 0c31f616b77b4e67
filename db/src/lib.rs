//! Validation authority datastore access.
//!
//! [`storage::ReplicationTarget`] is the seam the publisher writes through.
//! [`storage::postgres::PostgresStorage`] talks to the responder's database;
//! [`storage::memory::MemoryStorage`] keeps rows in-process.

pub mod models;
pub mod schema;
pub mod storage;
