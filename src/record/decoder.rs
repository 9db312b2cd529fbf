//! Typed decoders for the settlement program's account layouts.
//!
//! Layouts (byte-exact):
//!   ScheduledTransfer (219 bytes):
//!     tag(8) | id(8) | owner(32) | recipient(32) | asset(32) | escrow(32) |
//!     amount(8) | fee_amount(8) | execute_at_slot(8) | created_at_slot(8) |
//!     executed(1) | cancelled(1) | executor(32) | executed_at_slot(8) | nonce(1)
//!   ProtocolConfig (102 bytes):
//!     tag(8) | authority(32) | treasury(32) | protocol_fee_bps(2) |
//!     keeper_fee_bps(2) | totals(3 x 8) | paused(1) | nonce(1)
//!   KeeperStats (81 bytes):
//!     tag(8) | keeper(32) | counters(5 x 8) | nonce(1)
//!
//! Decoding is pure: same input, same output or same skip, never a
//! partially populated record.

use crate::error::DecodeError;
use crate::record::schema::{Field, FieldKind, RecordSchema};
use crate::types::{KeeperStats, ProtocolConfig, ScheduledTransfer};

/// Type tag the ledger stamps on scheduled transfer records.
pub const SCHEDULED_TRANSFER_TAG: [u8; 8] = [85, 104, 118, 159, 68, 231, 146, 48];

/// Type tag on the protocol configuration singleton.
pub const PROTOCOL_CONFIG_TAG: [u8; 8] = [207, 91, 250, 28, 152, 179, 215, 209];

/// Type tag on per-keeper statistics records.
pub const KEEPER_STATS_TAG: [u8; 8] = [160, 218, 21, 164, 201, 187, 229, 117];

const SCHEDULED_TRANSFER_FIELDS: &[Field] = &[
    Field::new("id", FieldKind::U64),
    Field::new("owner", FieldKind::Identity),
    Field::new("recipient", FieldKind::Identity),
    Field::new("asset", FieldKind::Identity),
    Field::new("escrow", FieldKind::Identity),
    Field::new("amount", FieldKind::U64),
    Field::new("fee_amount", FieldKind::U64),
    Field::new("execute_at_slot", FieldKind::U64),
    Field::new("created_at_slot", FieldKind::U64),
    Field::new("executed", FieldKind::Flag),
    Field::new("cancelled", FieldKind::Flag),
    Field::new("executor", FieldKind::Identity),
    Field::new("executed_at_slot", FieldKind::U64),
    Field::new("nonce", FieldKind::Byte),
];

pub static SCHEDULED_TRANSFER_SCHEMA: RecordSchema = RecordSchema {
    name: "ScheduledTransfer",
    tag: SCHEDULED_TRANSFER_TAG,
    fields: SCHEDULED_TRANSFER_FIELDS,
};

pub static PROTOCOL_CONFIG_SCHEMA: RecordSchema = RecordSchema {
    name: "ProtocolConfig",
    tag: PROTOCOL_CONFIG_TAG,
    fields: &[
        Field::new("authority", FieldKind::Identity),
        Field::new("treasury", FieldKind::Identity),
        Field::new("protocol_fee_bps", FieldKind::U16),
        Field::new("keeper_fee_bps", FieldKind::U16),
        Field::new("total_transfers_created", FieldKind::U64),
        Field::new("total_transfers_executed", FieldKind::U64),
        Field::new("total_fees_collected", FieldKind::U64),
        Field::new("paused", FieldKind::Flag),
        Field::new("nonce", FieldKind::Byte),
    ],
};

pub static KEEPER_STATS_SCHEMA: RecordSchema = RecordSchema {
    name: "KeeperStats",
    tag: KEEPER_STATS_TAG,
    fields: &[
        Field::new("keeper", FieldKind::Identity),
        Field::new("executions_count", FieldKind::U64),
        Field::new("total_fees_earned", FieldKind::U64),
        Field::new("failed_attempts", FieldKind::U64),
        Field::new("registered_at_slot", FieldKind::U64),
        Field::new("last_execution_slot", FieldKind::U64),
        Field::new("nonce", FieldKind::Byte),
    ],
};

/// Serialized length of a transfer record; doubles as the listing size
/// filter that narrows discovery to this record type.
pub const TRANSFER_RECORD_LEN: usize = crate::record::schema::layout_len(SCHEDULED_TRANSFER_FIELDS);

impl ScheduledTransfer {
    /// Decode from a raw account buffer. Wrong length or tag is a skip.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = SCHEDULED_TRANSFER_SCHEMA.reader(data)?;
        let record = Self {
            id: r.u64()?,
            owner: r.identity()?,
            recipient: r.identity()?,
            asset: r.identity()?,
            escrow: r.identity()?,
            amount: r.u64()?,
            fee_amount: r.u64()?,
            execute_at_slot: r.u64()?,
            created_at_slot: r.u64()?,
            executed: r.flag()?,
            cancelled: r.flag()?,
            executor: r.identity()?,
            executed_at_slot: r.u64()?,
            nonce: r.byte()?,
        };
        r.finish()?;
        Ok(record)
    }

    /// Serialize back to the ledger layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = SCHEDULED_TRANSFER_SCHEMA.writer();
        w.u64(self.id)
            .identity(&self.owner)
            .identity(&self.recipient)
            .identity(&self.asset)
            .identity(&self.escrow)
            .u64(self.amount)
            .u64(self.fee_amount)
            .u64(self.execute_at_slot)
            .u64(self.created_at_slot)
            .flag(self.executed)
            .flag(self.cancelled)
            .identity(&self.executor)
            .u64(self.executed_at_slot)
            .byte(self.nonce);
        w.finish()
    }
}

impl ProtocolConfig {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = PROTOCOL_CONFIG_SCHEMA.reader(data)?;
        let record = Self {
            authority: r.identity()?,
            treasury: r.identity()?,
            protocol_fee_bps: r.u16()?,
            keeper_fee_bps: r.u16()?,
            total_transfers_created: r.u64()?,
            total_transfers_executed: r.u64()?,
            total_fees_collected: r.u64()?,
            paused: r.flag()?,
            nonce: r.byte()?,
        };
        r.finish()?;
        Ok(record)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = PROTOCOL_CONFIG_SCHEMA.writer();
        w.identity(&self.authority)
            .identity(&self.treasury)
            .u16(self.protocol_fee_bps)
            .u16(self.keeper_fee_bps)
            .u64(self.total_transfers_created)
            .u64(self.total_transfers_executed)
            .u64(self.total_fees_collected)
            .flag(self.paused)
            .byte(self.nonce);
        w.finish()
    }
}

impl KeeperStats {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = KEEPER_STATS_SCHEMA.reader(data)?;
        let record = Self {
            keeper: r.identity()?,
            executions_count: r.u64()?,
            total_fees_earned: r.u64()?,
            failed_attempts: r.u64()?,
            registered_at_slot: r.u64()?,
            last_execution_slot: r.u64()?,
            nonce: r.byte()?,
        };
        r.finish()?;
        Ok(record)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = KEEPER_STATS_SCHEMA.writer();
        w.identity(&self.keeper)
            .u64(self.executions_count)
            .u64(self.total_fees_earned)
            .u64(self.failed_attempts)
            .u64(self.registered_at_slot)
            .u64(self.last_execution_slot)
            .byte(self.nonce);
        w.finish()
    }
}
