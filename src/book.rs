//! Per-instrument two-sided limit order book: price-time priority, O(1)-ish
//! cancel-by-id, and taker matching with trade emission.
//!
//! Each side is a `BTreeMap<price, VecDeque<BookOrder>>` ordered for
//! best-price lookup, plus a `HashMap<id, IndexEntry>` for cancel. `VecDeque`
//! has no stable iterators, so the index stores `(side, price)` and cancel
//! scans the (typically one- or two-element) queue at that price rather than
//! holding an iterator directly.

use std::collections::{BTreeMap, VecDeque};

use ahash::AHashMap;

use crate::wire::types::{Side, TradeBody};

/// A resting order. Lives at exactly one (side, price) queue position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookOrder {
    pub exch_order_id: u64,
    pub remaining_qty: i32,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    side: Side,
    price_ticks: i64,
}

type LevelQueue = VecDeque<BookOrder>;
type PriceMap = BTreeMap<i64, LevelQueue>;

/// Single-instrument order book. Holds no instrument identity itself — the
/// [`crate::engine::Engine`] owns the instrument-id → book mapping.
#[derive(Debug, Default)]
pub struct OrderBook {
    bids: PriceMap,
    asks: PriceMap,
    id_index: AHashMap<u64, IndexEntry>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn side_map(&self, side: Side) -> &PriceMap {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_map_mut(&mut self, side: Side) -> &mut PriceMap {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Rests a new order at `(side, price)`, appending to the FIFO tail.
    ///
    /// Returns `false` with no state change if `qty <= 0`, `price < 0`, or
    /// `exch_order_id` is already present in the book.
    pub fn add_resting(&mut self, exch_order_id: u64, side: Side, price_ticks: i64, qty: i32) -> bool {
        if qty <= 0 || price_ticks < 0 || self.id_index.contains_key(&exch_order_id) {
            return false;
        }

        self.side_map_mut(side)
            .entry(price_ticks)
            .or_default()
            .push_back(BookOrder {
                exch_order_id,
                remaining_qty: qty,
            });
        self.id_index.insert(
            exch_order_id,
            IndexEntry {
                side,
                price_ticks,
            },
        );
        true
    }

    /// Removes `exch_order_id` from its queue, dropping the price level if it
    /// becomes empty. Returns `false` with no state change if the id is unknown.
    pub fn cancel_order(&mut self, exch_order_id: u64) -> bool {
        let Some(entry) = self.id_index.remove(&exch_order_id) else {
            return false;
        };

        let price_map = self.side_map_mut(entry.side);
        let level = price_map
            .get_mut(&entry.price_ticks)
            .expect("index entry must reference an existing price level");
        let pos = level
            .iter()
            .position(|o| o.exch_order_id == exch_order_id)
            .expect("index entry must reference an order present in its queue");
        level.remove(pos);
        if level.is_empty() {
            price_map.remove(&entry.price_ticks);
        }
        true
    }

    fn crosses(taker_side: Side, taker_price: i64, resting_price: i64) -> bool {
        match taker_side {
            Side::Bid => taker_price >= resting_price,
            Side::Ask => taker_price <= resting_price,
        }
    }

    /// Matches an incoming taker order against the opposite side using
    /// price-time priority, appending one [`TradeBody`] per maker consumed to
    /// `out_trades` and returning the total filled quantity.
    ///
    /// Each trade is priced at the *maker's* resting price (price improvement),
    /// never the taker's limit. A no-op (returns `0`, no state change, no
    /// trades) when `qty <= 0` or `taker_limit_price < 0`.
    pub fn match_taker(
        &mut self,
        taker_exch_order_id: u64,
        taker_side: Side,
        taker_limit_price: i64,
        qty: i32,
        out_trades: &mut Vec<TradeBody>,
        instrument_id: u32,
        liquidity_flag: u8,
    ) -> i32 {
        if qty <= 0 || taker_limit_price < 0 {
            return 0;
        }

        let resting_side = taker_side.opposite();
        let mut remaining = qty;
        let mut filled = 0i32;

        loop {
            if remaining == 0 {
                break;
            }

            let best_price = match resting_side {
                Side::Bid => self.bids.keys().next_back().copied(),
                Side::Ask => self.asks.keys().next().copied(),
            };
            let Some(resting_price) = best_price else {
                break;
            };
            if !Self::crosses(taker_side, taker_limit_price, resting_price) {
                break;
            }

            let price_map = self.side_map_mut(resting_side);
            let level = price_map
                .get_mut(&resting_price)
                .expect("best price must have a non-empty level");

            while remaining > 0 {
                let Some(maker) = level.front_mut() else {
                    break;
                };

                let traded = remaining.min(maker.remaining_qty);
                maker.remaining_qty -= traded;
                remaining -= traded;
                filled += traded;

                out_trades.push(TradeBody {
                    price_ticks: resting_price.into(),
                    qty: traded.into(),
                    liquidity_flag,
                    _reserved: [0; 3],
                    resting_exch_order_id: maker.exch_order_id.into(),
                    taking_exch_order_id: taker_exch_order_id.into(),
                    instrument_id: instrument_id.into(),
                    _tail_pad: 0u32.into(),
                });

                if maker.remaining_qty == 0 {
                    let dead_id = maker.exch_order_id;
                    level.pop_front();
                    self.id_index.remove(&dead_id);
                }
            }

            if level.is_empty() {
                price_map.remove(&resting_price);
            }
        }

        filled
    }

    /// Best bid price and head-of-FIFO quantity, or `None` if the bid side is empty.
    pub fn best_bid(&self) -> Option<(i64, i32)> {
        self.bids
            .iter()
            .next_back()
            .map(|(price, level)| (*price, level.front().expect("non-empty level").remaining_qty))
    }

    /// Best ask price and head-of-FIFO quantity, or `None` if the ask side is empty.
    pub fn best_ask(&self) -> Option<(i64, i32)> {
        self.asks
            .iter()
            .next()
            .map(|(price, level)| (*price, level.front().expect("non-empty level").remaining_qty))
    }

    pub fn num_orders(&self) -> usize {
        self.id_index.len()
    }

    pub fn empty_bid(&self) -> bool {
        self.bids.is_empty()
    }

    pub fn empty_ask(&self) -> bool {
        self.asks.is_empty()
    }
}
