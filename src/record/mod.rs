//! Fixed-layout binary record decoding.
//!
//! The ledger stores its accounts as fixed-width byte buffers with a
//! leading 8-byte type tag. Each record type declares its layout once as
//! an ordered field schema; one generic cursor routine interprets it.

pub mod decoder;
pub mod schema;

pub use decoder::{
    KEEPER_STATS_SCHEMA, PROTOCOL_CONFIG_SCHEMA, SCHEDULED_TRANSFER_SCHEMA, TRANSFER_RECORD_LEN,
};
pub use schema::{Field, FieldKind, FieldReader, FieldWriter, RecordSchema};
