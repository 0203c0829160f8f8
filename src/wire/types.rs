//! Fixed-layout wire records for the matching engine protocol.
//!
//! Every record here is backed by `zerocopy`'s byte-order wrapper integers so
//! that `encode`/`decode` are pure byte copies with no host-endianness or
//! padding surprises. All multi-byte fields are little-endian on the wire.

use zerocopy::little_endian::{I32, I64, U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Single fixed protocol version. Any header with a different value is a
/// protocol error and the connection must be closed.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum body length (not counting the header) of any frame.
pub const MAX_FRAME: usize = 65_536;

/// Discriminant for [`Header::msg_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    Reserved = 0,
    New = 1,
    Cancel = 2,
    Ack = 3,
    Trade = 4,
}

impl TryFrom<u8> for MsgType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MsgType::Reserved),
            1 => Ok(MsgType::New),
            2 => Ok(MsgType::Cancel),
            3 => Ok(MsgType::Ack),
            4 => Ok(MsgType::Trade),
            other => Err(other),
        }
    }
}

bitflags::bitflags! {
    /// Time-in-force bits carried in [`OrderNewBody::flags`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimeInForce: u8 {
        /// Immediate-Or-Cancel: match what's possible now, never rest the residual.
        const IOC = 0b0000_0001;
        /// Fill-Or-Kill: fill the whole quantity immediately or reject it whole.
        /// Reserved by the protocol; see `Engine::on_new` for this crate's resolution.
        const FOK = 0b0000_0010;
    }
}

/// Order side: 0 = bid (buy), 1 = ask (sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Bid = 0,
    Ask = 1,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// Liquidity flag recorded on a trade when this side is the aggressor.
    pub fn liquidity_flag(self) -> u8 {
        match self {
            Side::Bid => 0,
            Side::Ask => 1,
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Side::Bid),
            1 => Ok(Side::Ask),
            other => Err(other),
        }
    }
}

/// 24-byte frame header shared by every message.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Unaligned, KnownLayout, Immutable, FromBytes, IntoBytes)]
pub struct Header {
    pub msg_type: u8,
    pub version: u8,
    pub size: U16,
    /// Implicit padding a natural C struct layout inserts to align `seqno` to 8 bytes.
    pub _pad: U32,
    pub seqno: U64,
    pub ts_ns: U64,
}

const _: () = assert!(core::mem::size_of::<Header>() == 24, "Header must be 24 bytes");

/// 32-byte `NEW` order body.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Unaligned, KnownLayout, Immutable, FromBytes, IntoBytes)]
pub struct OrderNewBody {
    pub client_order_id: U64,
    pub price_ticks: I64,
    pub qty: I32,
    pub instrument_id: U32,
    pub side: u8,
    pub flags: u8,
    pub _reserved: U16,
}

const _: () = assert!(core::mem::size_of::<OrderNewBody>() == 32, "OrderNewBody must be 32 bytes");
const _: () = assert!(
    core::mem::size_of::<Header>() + core::mem::size_of::<OrderNewBody>() == 56,
    "NEW message must be 56 bytes"
);

/// 24-byte `CANCEL` body.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Unaligned, KnownLayout, Immutable, FromBytes, IntoBytes)]
pub struct OrderCancelBody {
    pub exch_order_id: U64,
    pub client_order_id: U64,
    pub instrument_id: U32,
    pub reason_code: u8,
    pub _reserved: [u8; 3],
}

const _: () = assert!(core::mem::size_of::<OrderCancelBody>() == 24, "OrderCancelBody must be 24 bytes");
const _: () = assert!(
    core::mem::size_of::<Header>() + core::mem::size_of::<OrderCancelBody>() == 48,
    "CANCEL message must be 48 bytes"
);

/// 40-byte `ACK`/`NACK` body.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Unaligned, KnownLayout, Immutable, FromBytes, IntoBytes)]
pub struct AckBody {
    pub client_order_id: U64,
    pub exch_order_id: U64,
    pub status: u8,
    pub _reserved: [u8; 7],
    pub ts_engine_recv_ns: U64,
    pub ts_engine_ack_ns: U64,
}

const _: () = assert!(core::mem::size_of::<AckBody>() == 40, "AckBody must be 40 bytes");
const _: () = assert!(
    core::mem::size_of::<Header>() + core::mem::size_of::<AckBody>() == 64,
    "ACK message must be 64 bytes"
);

impl AckBody {
    pub const STATUS_ACK: u8 = 0;
    pub const STATUS_NACK: u8 = 1;

    pub fn is_ack(&self) -> bool {
        self.status == Self::STATUS_ACK
    }
}

/// 40-byte `TRADE` body.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Unaligned, KnownLayout, Immutable, FromBytes, IntoBytes)]
pub struct TradeBody {
    pub price_ticks: I64,
    pub qty: I32,
    pub liquidity_flag: u8,
    pub _reserved: [u8; 3],
    pub resting_exch_order_id: U64,
    pub taking_exch_order_id: U64,
    pub instrument_id: U32,
    pub _tail_pad: U32,
}

const _: () = assert!(core::mem::size_of::<TradeBody>() == 40, "TradeBody must be 40 bytes");
const _: () = assert!(
    core::mem::size_of::<Header>() + core::mem::size_of::<TradeBody>() == 64,
    "TRADE message must be 64 bytes"
);
