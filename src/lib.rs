//! pdmldb - load packet captures into a relational database.
//!
//! This crate is the front end: CLI, capture discovery, dissector
//! child-process handling and the concrete SQL backends. The schema
//! model, PDML transformation and the adaptive writer live in
//! [`pdmldb_core`].

pub mod backend;
pub mod cli;
pub mod pipeline;
