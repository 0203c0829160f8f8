//! Per-connection framed read loop: decode a request, call the [`Engine`],
//! write back an ack then trade frames in order.
//!
//! One dispatcher task runs per connection, sharing the `Engine` behind a
//! mutex so request ordering across connections is externally serialized.
//! The mutex critical section spans exactly one `on_new`/`on_cancel` call —
//! no `.await` inside it — so the dispatcher's socket I/O never blocks other
//! connections' turn at the engine for longer than one synchronous match.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::error::DispatchError;
use crate::wire::codec;
use crate::wire::types::{AckBody, Header, MsgType, OrderCancelBody, OrderNewBody, TimeInForce, TradeBody};

const HEADER_LEN: usize = core::mem::size_of::<Header>();

/// Runs the read/dispatch/reply loop for one connection until EOF or a
/// protocol error. `conn_label` is used only for log correlation.
pub async fn run<S>(mut stream: S, engine: Arc<Mutex<Engine>>, conn_label: &str) -> Result<(), DispatchError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut trade_seqno: u64 = 1;

    loop {
        let mut header_buf = [0u8; HEADER_LEN];
        match read_exact_or_eof(&mut stream, &mut header_buf).await? {
            ReadOutcome::CleanEof => {
                info!(conn_label, "connection closed");
                return Ok(());
            }
            ReadOutcome::MidFrameEof => {
                return Err(DispatchError::UnexpectedEof);
            }
            ReadOutcome::Full => {}
        }

        let header: Header = codec::decode(&header_buf)?;
        codec::check_version(&header)?;
        let body_len = codec::check_frame_size(&header)?;

        let mut body_buf = vec![0u8; body_len];
        stream.read_exact(&mut body_buf).await?;

        let Ok(msg_type) = MsgType::try_from(header.msg_type) else {
            warn!(conn_label, msg_type = header.msg_type, "unknown message type, ignoring");
            continue;
        };

        match msg_type {
            MsgType::New => {
                let body: OrderNewBody = codec::decode_body(&body_buf)?;
                let rest_leftover = !TimeInForce::from_bits_truncate(body.flags).contains(TimeInForce::IOC);
                let (ack, trades) = engine.lock().await.on_new(&body, rest_leftover);
                write_ack(&mut stream, &ack).await?;
                write_trades(&mut stream, &trades, &mut trade_seqno).await?;
            }
            MsgType::Cancel => {
                let body: OrderCancelBody = codec::decode_body(&body_buf)?;
                let (ack, _trades) = engine.lock().await.on_cancel(&body);
                write_ack(&mut stream, &ack).await?;
            }
            MsgType::Ack | MsgType::Trade | MsgType::Reserved => {
                warn!(conn_label, ?msg_type, "client sent a server-direction message type, ignoring");
            }
        }
    }
}

enum ReadOutcome {
    Full,
    CleanEof,
    MidFrameEof,
}

/// Reads exactly `buf.len()` bytes, distinguishing a clean EOF before any
/// byte was read (ordinary connection close) from an EOF partway through a
/// frame (a protocol error).
async fn read_exact_or_eof<S: AsyncRead + Unpin>(stream: &mut S, buf: &mut [u8]) -> Result<ReadOutcome, DispatchError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Ok(if filled == 0 { ReadOutcome::CleanEof } else { ReadOutcome::MidFrameEof });
        }
        filled += n;
    }
    Ok(ReadOutcome::Full)
}

async fn write_ack<S: AsyncWrite + Unpin>(stream: &mut S, ack: &AckBody) -> Result<(), DispatchError> {
    let header = Header {
        msg_type: MsgType::Ack as u8,
        version: crate::wire::types::PROTOCOL_VERSION,
        size: 0u16.into(),
        _pad: 0u32.into(),
        seqno: 0u64.into(),
        ts_ns: u64::from(ack.ts_engine_ack_ns).into(),
    };
    let frame = codec::pack(header, ack);
    stream.write_all(&frame).await?;
    Ok(())
}

async fn write_trades<S: AsyncWrite + Unpin>(stream: &mut S, trades: &[TradeBody], seqno: &mut u64) -> Result<(), DispatchError> {
    for trade in trades {
        let header = Header {
            msg_type: MsgType::Trade as u8,
            version: crate::wire::types::PROTOCOL_VERSION,
            size: 0u16.into(),
            _pad: 0u32.into(),
            seqno: (*seqno).into(),
            ts_ns: 0u64.into(),
        };
        *seqno += 1;
        let frame = codec::pack(header, trade);
        stream.write_all(&frame).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use zerocopy::IntoBytes;

    fn new_order_frame(seqno: u64, client_order_id: u64, side: u8, price: i64, qty: i32, instrument_id: u32, flags: u8) -> Vec<u8> {
        let header = Header {
            msg_type: MsgType::New as u8,
            version: crate::wire::types::PROTOCOL_VERSION,
            size: 0u16.into(),
            _pad: 0u32.into(),
            seqno: seqno.into(),
            ts_ns: 0u64.into(),
        };
        let body = OrderNewBody {
            client_order_id: client_order_id.into(),
            price_ticks: price.into(),
            qty: qty.into(),
            instrument_id: instrument_id.into(),
            side,
            flags,
            _reserved: 0u16.into(),
        };
        codec::pack(header, &body)
    }

    #[tokio::test]
    async fn rejects_on_version_mismatch_by_closing() {
        let (mut client, server) = duplex(4096);
        let engine = Arc::new(Mutex::new(Engine::new()));

        let mut header = Header {
            msg_type: MsgType::New as u8,
            version: 2, // wrong
            size: 0u16.into(),
            _pad: 0u32.into(),
            seqno: 0u64.into(),
            ts_ns: 0u64.into(),
        };
        header.size = (HEADER_LEN as u16).into();
        client.write_all(header.as_bytes()).await.unwrap();

        let result = run(server, engine, "test").await;
        assert!(matches!(result, Err(DispatchError::Codec(_))));
    }

    #[tokio::test]
    async fn full_new_then_cancel_roundtrip() {
        let (mut client, server) = duplex(8192);
        let engine = Arc::new(Mutex::new(Engine::new()));
        engine.lock().await.add_new_instrument("AAPL");

        let handle = tokio::spawn(run(server, engine, "test"));

        let frame = new_order_frame(1, 42, 0, 100, 10, 1, 0);
        client.write_all(&frame).await.unwrap();

        let mut ack_buf = [0u8; HEADER_LEN + 40];
        client.read_exact(&mut ack_buf).await.unwrap();
        let view = codec::unpack_frame(&ack_buf).unwrap();
        assert_eq!(view.header.msg_type, MsgType::Ack as u8);
        let ack: AckBody = codec::decode_body(view.body).unwrap();
        assert_eq!(ack.status, AckBody::STATUS_ACK);

        drop(client);
        let _ = handle.await;
    }
}
