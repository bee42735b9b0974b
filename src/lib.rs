//! zone-ingest: sensor readings from the field into a per-zone json store.
//!
//! - `ingest`: udp listener that upserts each reading by `zone_id`
//! - `store`: the json array file behind it
//! - `api`: optional read-only http view of that file
//! - `serial`: standalone reader that prints json lines from a serial port

pub mod api;
pub mod config;
pub mod domain;
pub mod ingest;
pub mod logging;
pub mod serial;
pub mod store;
