//! Owns the instrument registry, allocates exchange-order-ids, and turns
//! decoded `NEW`/`CANCEL` bodies into acks and trade lists.
//!
//! Instruments are kept as parallel maps keyed by instrument id: one from id
//! to its `OrderBook`, one from id to its human ticker. `ahash::AHashMap` is
//! used for both, matching the hasher already in use for the book's id index.

use std::time::Instant;

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::book::OrderBook;
use crate::wire::types::{AckBody, OrderCancelBody, OrderNewBody, Side, TimeInForce, TradeBody};

/// Engine-wide state: instrument registry plus the next ids to allocate.
///
/// `now_ns()` draws from a single [`Instant`] captured at construction: a
/// monotonic steady clock, not wall-clock time. Two calls within one
/// `on_new` may legitimately return the same value.
pub struct Engine {
    books: AHashMap<u32, OrderBook>,
    tickers: AHashMap<u32, String>,
    next_exch_id: u64,
    next_instrument_id: u32,
    clock_origin: Instant,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            books: AHashMap::new(),
            tickers: AHashMap::new(),
            next_exch_id: 1,
            next_instrument_id: 1,
            clock_origin: Instant::now(),
        }
    }

    fn now_ns(&self) -> u64 {
        self.clock_origin.elapsed().as_nanos() as u64
    }

    fn allocate_exch_id(&mut self) -> u64 {
        let id = self.next_exch_id;
        self.next_exch_id += 1;
        id
    }

    /// Registers a new, empty book and returns its instrument id. Not itself
    /// exposed on the wire; called at construction time for the configured
    /// instrument set.
    pub fn add_new_instrument(&mut self, name: impl Into<String>) -> u32 {
        let id = self.next_instrument_id;
        self.next_instrument_id += 1;
        self.books.insert(id, OrderBook::new());
        self.tickers.insert(id, name.into());
        id
    }

    fn instrument_exists(&self, instrument_id: u32) -> bool {
        self.books.contains_key(&instrument_id)
    }

    fn make_ack(client_order_id: u64, exch_order_id: u64, status: u8, recv_ns: u64, ack_ns: u64) -> AckBody {
        AckBody {
            client_order_id: client_order_id.into(),
            exch_order_id: exch_order_id.into(),
            status,
            _reserved: [0; 7],
            ts_engine_recv_ns: recv_ns.into(),
            ts_engine_ack_ns: ack_ns.into(),
        }
    }

    /// Validates, matches, optionally rests the residual, and acks a `NEW`.
    ///
    /// `rest_leftover` is the dispatcher's translation of the TIF flags:
    /// true iff `flags & IOC == 0`. Validation failures (bad qty/price/side,
    /// unknown instrument) are reported as NACK (`status = 1`, `exch_order_id
    /// = 0`) with no trades — this function never returns `Err`.
    pub fn on_new(&mut self, body: &OrderNewBody, rest_leftover: bool) -> (AckBody, Vec<TradeBody>) {
        let recv_ns = self.now_ns();
        let client_order_id = u64::from(body.client_order_id);

        let reject = |reason: &str, engine: &Engine| {
            warn!(reason, client_order_id, "NEW rejected");
            (Self::make_ack(client_order_id, 0, AckBody::STATUS_NACK, recv_ns, engine.now_ns()), Vec::new())
        };

        let qty = i32::from(body.qty);
        let price_ticks = i64::from(body.price_ticks);
        let instrument_id = u32::from(body.instrument_id);

        if qty <= 0 {
            return reject("non-positive qty", self);
        }
        if price_ticks < 0 {
            return reject("negative price", self);
        }
        let Ok(side) = Side::try_from(body.side) else {
            return reject("invalid side", self);
        };
        if !self.instrument_exists(instrument_id) {
            return reject("unknown instrument", self);
        }
        let flags = TimeInForce::from_bits_truncate(body.flags);
        if flags.contains(TimeInForce::FOK) {
            // Fill-or-kill isn't implemented; reject explicitly rather than
            // silently downgrading to IOC, so a client relying on
            // whole-fill-or-nothing never gets a partial fill by surprise.
            return reject("FOK not supported", self);
        }

        let exch_id = self.allocate_exch_id();
        let book = self
            .books
            .get_mut(&instrument_id)
            .expect("instrument_exists just confirmed presence");

        let mut trades = Vec::new();
        let filled = book.match_taker(exch_id, side, price_ticks, qty, &mut trades, instrument_id, side.liquidity_flag());
        let residual = qty - filled;

        if rest_leftover && residual > 0 {
            book.add_resting(exch_id, side, price_ticks, residual);
        }

        let ack_ns = self.now_ns();
        debug!(exch_id, client_order_id, filled, residual, trade_count = trades.len(), "NEW accepted");
        (
            Self::make_ack(client_order_id, exch_id, AckBody::STATUS_ACK, recv_ns, ack_ns),
            trades,
        )
    }

    /// Cancels by exchange-order-id on the named instrument. Unknown
    /// instrument or unknown id both NACK; either way the requested
    /// `exch_order_id`/`client_order_id` are echoed back.
    pub fn on_cancel(&mut self, body: &OrderCancelBody) -> (AckBody, Vec<TradeBody>) {
        let recv_ns = self.now_ns();
        let client_order_id = u64::from(body.client_order_id);
        let exch_order_id = u64::from(body.exch_order_id);
        let instrument_id = u32::from(body.instrument_id);

        let Some(book) = self.books.get_mut(&instrument_id) else {
            warn!(instrument_id, "CANCEL on unknown instrument");
            let ack_ns = self.now_ns();
            return (
                Self::make_ack(client_order_id, exch_order_id, AckBody::STATUS_NACK, recv_ns, ack_ns),
                Vec::new(),
            );
        };

        let ok = exch_order_id != 0 && book.cancel_order(exch_order_id);
        let ack_ns = self.now_ns();
        debug!(exch_order_id, client_order_id, ok, "CANCEL processed");
        (
            Self::make_ack(
                client_order_id,
                exch_order_id,
                if ok { AckBody::STATUS_ACK } else { AckBody::STATUS_NACK },
                recv_ns,
                ack_ns,
            ),
            Vec::new(),
        )
    }

    pub fn best_bid(&self, instrument_id: u32) -> Option<(i64, i32)> {
        self.books.get(&instrument_id).and_then(OrderBook::best_bid)
    }

    pub fn best_ask(&self, instrument_id: u32) -> Option<(i64, i32)> {
        self.books.get(&instrument_id).and_then(OrderBook::best_ask)
    }

    pub fn ticker(&self, instrument_id: u32) -> Option<&str> {
        self.tickers.get(&instrument_id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order(client_order_id: u64, side: Side, price: i64, qty: i32, instrument_id: u32, flags: u8) -> OrderNewBody {
        OrderNewBody {
            client_order_id: client_order_id.into(),
            price_ticks: price.into(),
            qty: qty.into(),
            instrument_id: instrument_id.into(),
            side: side as u8,
            flags,
            _reserved: 0u16.into(),
        }
    }

    fn cancel(client_order_id: u64, exch_order_id: u64, instrument_id: u32) -> OrderCancelBody {
        OrderCancelBody {
            exch_order_id: exch_order_id.into(),
            client_order_id: client_order_id.into(),
            instrument_id: instrument_id.into(),
            reason_code: 0,
            _reserved: [0; 3],
        }
    }

    #[test]
    fn cancel_unknown_nacks_with_echoed_id() {
        let mut engine = Engine::new();
        let instr = engine.add_new_instrument("AAPL");
        let (ack, trades) = engine.on_cancel(&cancel(5001, 999_999, instr));
        assert_eq!(ack.status, AckBody::STATUS_NACK);
        assert_eq!(u64::from(ack.exch_order_id), 999_999);
        assert_eq!(u64::from(ack.client_order_id), 5001);
        assert!(trades.is_empty());
    }

    #[test]
    fn rest_then_cancel() {
        let mut engine = Engine::new();
        let instr = engine.add_new_instrument("AAPL");

        let (ack, trades) = engine.on_new(&new_order(6001, Side::Ask, 101, 40, instr, 0), true);
        assert_eq!(ack.status, AckBody::STATUS_ACK);
        assert!(trades.is_empty());
        let exch_id = u64::from(ack.exch_order_id);
        assert_eq!(exch_id, 1);

        let (ack2, _) = engine.on_cancel(&cancel(6002, exch_id, instr));
        assert_eq!(ack2.status, AckBody::STATUS_ACK);
        assert_eq!(engine.best_ask(instr), None);
    }

    #[test]
    fn walk_two_levels_via_engine() {
        let mut engine = Engine::new();
        let instr = engine.add_new_instrument("AAPL");

        engine.on_new(&new_order(1001, Side::Ask, 101, 30, instr, 0), true);
        engine.on_new(&new_order(1002, Side::Ask, 102, 50, instr, 0), true);

        let (ack, trades) = engine.on_new(&new_order(2001, Side::Bid, 102, 60, instr, TimeInForce::IOC.bits()), true);
        assert_eq!(ack.status, AckBody::STATUS_ACK);
        assert_eq!(trades.len(), 2);
        assert_eq!((i64::from(trades[0].price_ticks), i32::from(trades[0].qty)), (101, 30));
        assert_eq!((i64::from(trades[1].price_ticks), i32::from(trades[1].qty)), (102, 30));
        assert_eq!(engine.best_ask(instr), Some((102, 20)));
    }

    #[test]
    fn invalid_new_rejects_with_zero_exch_id() {
        let mut engine = Engine::new();
        let instr = engine.add_new_instrument("AAPL");
        let (ack, trades) = engine.on_new(&new_order(9000, Side::Bid, -1, 10, instr, 0), true);
        assert_eq!(ack.status, AckBody::STATUS_NACK);
        assert_eq!(u64::from(ack.exch_order_id), 0);
        assert!(trades.is_empty());
    }

    #[test]
    fn fifo_within_level_via_engine() {
        let mut engine = Engine::new();
        let instr = engine.add_new_instrument("AAPL");

        engine.on_new(&new_order(1001, Side::Bid, 100, 10, instr, 0), true);
        engine.on_new(&new_order(1002, Side::Bid, 100, 20, instr, 0), true);

        let (_, trades) = engine.on_new(&new_order(2001, Side::Ask, 100, 15, instr, TimeInForce::IOC.bits()), true);
        assert_eq!(trades.len(), 2);
        assert_eq!(i32::from(trades[0].qty), 10);
        assert_eq!(i32::from(trades[1].qty), 5);
    }

    #[test]
    fn ioc_never_rests_residual() {
        let mut engine = Engine::new();
        let instr = engine.add_new_instrument("AAPL");
        let (ack, _) = engine.on_new(&new_order(1, Side::Bid, 100, 10, instr, TimeInForce::IOC.bits()), false);
        assert_eq!(ack.status, AckBody::STATUS_ACK);
        assert_eq!(engine.best_bid(instr), None);
    }

    #[test]
    fn exch_ids_are_strictly_increasing_across_instruments() {
        let mut engine = Engine::new();
        let a = engine.add_new_instrument("AAPL");
        let b = engine.add_new_instrument("MSFT");

        let (ack1, _) = engine.on_new(&new_order(1, Side::Bid, 10, 5, a, 0), true);
        let (ack2, _) = engine.on_new(&new_order(2, Side::Bid, 10, 5, b, 0), true);
        let (ack3, _) = engine.on_new(&new_order(3, Side::Bid, 10, 5, a, 0), true);

        assert_eq!(u64::from(ack1.exch_order_id), 1);
        assert_eq!(u64::from(ack2.exch_order_id), 2);
        assert_eq!(u64::from(ack3.exch_order_id), 3);
    }

    #[test]
    fn cross_instrument_cancel_is_isolated() {
        let mut engine = Engine::new();
        let a = engine.add_new_instrument("AAPL");
        let b = engine.add_new_instrument("MSFT");

        let (ack, _) = engine.on_new(&new_order(1, Side::Bid, 10, 5, a, 0), true);
        let exch_id = u64::from(ack.exch_order_id);

        // Cancelling the same id against the wrong instrument must NACK, not
        // reach across into instrument `a`'s book.
        let (bad_cancel, _) = engine.on_cancel(&cancel(1, exch_id, b));
        assert_eq!(bad_cancel.status, AckBody::STATUS_NACK);
        assert_eq!(engine.best_bid(a), Some((10, 5)));
    }

    #[test]
    fn fok_is_rejected_outright() {
        let mut engine = Engine::new();
        let instr = engine.add_new_instrument("AAPL");
        let (ack, trades) = engine.on_new(&new_order(1, Side::Bid, 10, 5, instr, TimeInForce::FOK.bits()), true);
        assert_eq!(ack.status, AckBody::STATUS_NACK);
        assert!(trades.is_empty());
    }

    #[test]
    fn cancel_with_zero_exch_order_id_nacks() {
        let mut engine = Engine::new();
        let instr = engine.add_new_instrument("AAPL");
        let (ack, _) = engine.on_cancel(&cancel(1, 0, instr));
        assert_eq!(ack.status, AckBody::STATUS_NACK);
    }
}
