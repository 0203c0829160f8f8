//! Property-based tests for the book and engine invariants: conservation of
//! quantity across a match, price improvement, FIFO fairness within a price
//! level, monotone exchange-order-id allocation, and determinism of replayed
//! request sequences.

use proptest::prelude::*;

use lighting_match_engine_core::book::OrderBook;
use lighting_match_engine_core::engine::Engine;
use lighting_match_engine_core::wire::types::{OrderNewBody, Side, TimeInForce};

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Bid), Just(Side::Ask)]
}

fn new_order_body(client_order_id: u64, side: Side, price: i64, qty: i32, instrument_id: u32, ioc: bool) -> OrderNewBody {
    OrderNewBody {
        client_order_id: client_order_id.into(),
        price_ticks: price.into(),
        qty: qty.into(),
        instrument_id: instrument_id.into(),
        side: side as u8,
        flags: if ioc { TimeInForce::IOC.bits() } else { 0 },
        _reserved: 0u16.into(),
    }
}

proptest! {
    /// P3 — conservation of quantity: a taker's input quantity always splits
    /// exactly into matched trades plus whatever residual remains.
    #[test]
    fn p3_conservation_of_quantity(
        resting_prices in prop::collection::vec(1i64..20, 0..8),
        taker_side in side_strategy(),
        taker_price in 0i64..20,
        taker_qty in 1i32..200,
    ) {
        let mut book = OrderBook::new();
        let resting_side = taker_side.opposite();
        for (i, price) in resting_prices.iter().enumerate() {
            book.add_resting((i + 1) as u64, resting_side, *price, 10);
        }

        let mut trades = Vec::new();
        let filled = book.match_taker(9999, taker_side, taker_price, taker_qty, &mut trades, 1, taker_side.liquidity_flag());
        let traded_sum: i32 = trades.iter().map(|t| i32::from(t.qty)).sum();

        prop_assert_eq!(filled, traded_sum);
        prop_assert!(filled <= taker_qty);
        let residual = taker_qty - filled;
        prop_assert_eq!(filled + residual, taker_qty);
    }

    /// P4 — price improvement: every trade prices at the maker's resting
    /// price, and that price is never worse for the taker than its own limit.
    #[test]
    fn p4_price_improvement(
        resting_prices in prop::collection::vec(1i64..20, 1..8),
        taker_side in side_strategy(),
        taker_price in 0i64..20,
        taker_qty in 1i32..200,
    ) {
        let mut book = OrderBook::new();
        let resting_side = taker_side.opposite();
        for (i, price) in resting_prices.iter().enumerate() {
            book.add_resting((i + 1) as u64, resting_side, *price, 10);
        }

        let mut trades = Vec::new();
        book.match_taker(9999, taker_side, taker_price, taker_qty, &mut trades, 1, taker_side.liquidity_flag());

        for trade in &trades {
            let trade_price = i64::from(trade.price_ticks);
            match taker_side {
                Side::Bid => prop_assert!(trade_price <= taker_price),
                Side::Ask => prop_assert!(trade_price >= taker_price),
            }
        }
    }

    /// P5 — FIFO fairness: among resting orders at the same price, the one
    /// inserted earlier is consumed strictly earlier.
    #[test]
    fn p5_fifo_fairness_within_one_level(
        n_resting in 2usize..6,
        taker_qty in 1i32..400,
    ) {
        let mut book = OrderBook::new();
        for i in 0..n_resting {
            book.add_resting((i + 1) as u64, Side::Bid, 100, 10);
        }

        let mut trades = Vec::new();
        book.match_taker(9999, Side::Ask, 100, taker_qty, &mut trades, 1, 1);

        let consumed_ids: Vec<u64> = trades.iter().map(|t| u64::from(t.resting_exch_order_id)).collect();
        let mut sorted = consumed_ids.clone();
        sorted.sort_unstable();
        prop_assert_eq!(consumed_ids, sorted, "resting orders must be consumed in ascending insertion-rank order");
    }

    /// P7 — exchange-order-ids allocated by the Engine form a strictly
    /// increasing sequence starting at 1, regardless of how many of the
    /// requests in between were rejected (rejections never allocate an id).
    #[test]
    fn p7_monotone_exchange_ids(
        requests in prop::collection::vec((side_strategy(), 0i64..50, 1i32..50), 1..40),
    ) {
        let mut engine = Engine::new();
        let instr = engine.add_new_instrument("AAPL");

        let mut last_id = 0u64;
        let mut client_order_id = 1u64;
        for (side, price, qty) in requests {
            let (ack, _) = engine.on_new(&new_order_body(client_order_id, side, price, qty, instr, false), false);
            client_order_id += 1;
            if ack.status == lighting_match_engine_core::wire::types::AckBody::STATUS_ACK {
                let id = u64::from(ack.exch_order_id);
                prop_assert!(id > last_id);
                last_id = id;
            }
        }
    }

    /// P8 — determinism: replaying the same request sequence against a fresh
    /// engine produces the same ack statuses, exchange ids, and trade tuples
    /// (timestamps excluded, since those are explicitly not part of the
    /// deterministic contract).
    #[test]
    fn p8_determinism(
        requests in prop::collection::vec((side_strategy(), 0i64..20, 1i32..30, any::<bool>()), 1..30),
    ) {
        fn run(requests: &[(Side, i64, i32, bool)]) -> Vec<(u8, u64, Vec<(i64, i32, u64, u64)>)> {
            let mut engine = Engine::new();
            let instr = engine.add_new_instrument("AAPL");
            let mut out = Vec::new();
            for (i, (side, price, qty, ioc)) in requests.iter().enumerate() {
                let (ack, trades) = engine.on_new(&new_order_body(i as u64 + 1, *side, *price, *qty, instr, *ioc), false);
                let trade_tuples = trades
                    .iter()
                    .map(|t| {
                        (
                            i64::from(t.price_ticks),
                            i32::from(t.qty),
                            u64::from(t.resting_exch_order_id),
                            u64::from(t.taking_exch_order_id),
                        )
                    })
                    .collect();
                out.push((ack.status, u64::from(ack.exch_order_id), trade_tuples));
            }
            out
        }

        let run_a = run(&requests);
        let run_b = run(&requests);
        prop_assert_eq!(run_a, run_b);
    }
}
