//! Server entry point: parses configuration, pre-registers instruments,
//! optionally seeds a synthetic book for local smoke-testing, then runs the
//! transport accept loop until Ctrl-C.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use lighting_match_engine_core::config::ServerConfig;
use lighting_match_engine_core::engine::Engine;
use lighting_match_engine_core::transport;
use lighting_match_engine_core::wire::types::{OrderNewBody, Side};

/// Seeds alternating resting bids/asks into `instrument_id` around a fixed
/// mid price so `--seed-book-size` gives a demo client something to query
/// and trade against without the seed orders matching each other.
fn seed_book(engine: &mut Engine, instrument_id: u32, pairs: u32) {
    const MID: i64 = 10_000;
    for i in 0..pairs as i64 {
        let client_order_id = 1_000_000 + (i as u64) * 2;
        let bid = OrderNewBody {
            client_order_id: client_order_id.into(),
            price_ticks: (MID - 1 - i).into(),
            qty: 10i32.into(),
            instrument_id: instrument_id.into(),
            side: Side::Bid as u8,
            flags: 0,
            _reserved: 0u16.into(),
        };
        let ask = OrderNewBody {
            client_order_id: (client_order_id + 1).into(),
            price_ticks: (MID + 1 + i).into(),
            qty: 10i32.into(),
            instrument_id: instrument_id.into(),
            side: Side::Ask as u8,
            flags: 0,
            _reserved: 0u16.into(),
        };
        engine.on_new(&bid, true);
        engine.on_new(&ask, true);
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = ServerConfig::from_args().map_err(std::io::Error::other)?;

    let mut engine = Engine::new();
    let mut instrument_ids = Vec::with_capacity(config.instruments.len());
    for name in &config.instruments {
        let id = engine.add_new_instrument(name.clone());
        info!(instrument_id = id, ticker = name, "registered instrument");
        instrument_ids.push(id);
    }
    if config.seed_book_size > 0 {
        if let Some(&first) = instrument_ids.first() {
            seed_book(&mut engine, first, config.seed_book_size);
            info!(instrument_id = first, pairs = config.seed_book_size, "seeded demo book");
        }
    }

    let engine = Arc::new(Mutex::new(engine));
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    transport::serve(config.bind, engine, shutdown).await
}
