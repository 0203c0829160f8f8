//! Demo client: connects to a running server, places a couple of orders,
//! prints the acks and any resulting trades.

use std::time::Duration;

use tokio::net::TcpStream;

use lighting_match_engine_core::client::TradingClient;
use lighting_match_engine_core::wire::types::{Side, TimeInForce};

fn parse_args() -> (String, u32) {
    let args: Vec<String> = std::env::args().collect();
    let mut bind = "127.0.0.1:7878".to_string();
    let mut instrument_id = 1u32;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" if i + 1 < args.len() => {
                bind = args[i + 1].clone();
                i += 1;
            }
            "--instrument-id" if i + 1 < args.len() => {
                instrument_id = args[i + 1].parse().unwrap_or(1);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    (bind, instrument_id)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let (bind, instrument_id) = parse_args();
    let stream = TcpStream::connect(&bind).await?;
    let client = TradingClient::new(stream);

    let ack = client
        .place_order(instrument_id, Side::Bid, 10_000, 5, TimeInForce::empty())
        .await
        .map_err(std::io::Error::other)?;
    println!(
        "NEW bid -> status={} exch_order_id={}",
        ack.status,
        u64::from(ack.exch_order_id)
    );

    let ack = client
        .place_order(instrument_id, Side::Ask, 9_999, 5, TimeInForce::IOC)
        .await
        .map_err(std::io::Error::other)?;
    println!(
        "NEW ask (IOC, crosses) -> status={} exch_order_id={}",
        ack.status,
        u64::from(ack.exch_order_id)
    );

    // Give the background reader a moment to drain any trade frames
    // generated by the crossing order above before we exit.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut trades = client.trades;
    while let Ok(trade) = trades.try_recv() {
        println!(
            "TRADE price={} qty={} maker={} taker={}",
            i64::from(trade.price_ticks),
            i32::from(trade.qty),
            u64::from(trade.resting_exch_order_id),
            u64::from(trade.taking_exch_order_id)
        );
    }

    Ok(())
}
