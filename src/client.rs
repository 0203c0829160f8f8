//! Minimal async client SDK for placing and cancelling orders over the wire
//! protocol. A convenience wrapper for tests and the demo binary — it is not
//! on the server's wire-protocol path itself.
//!
//! `place_order`/`cancel_order` look synchronous from the caller's side: send
//! a request, await its ACK/NACK. A background task owns the read half of
//! the connection for its whole lifetime, demultiplexing ACK replies
//! (matched back to the caller that sent the corresponding request) from
//! TRADE frames (forwarded to `trades`) instead of interleaving them into
//! the request/reply calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::error::DispatchError;
use crate::wire::codec;
use crate::wire::types::{AckBody, Header, MsgType, OrderCancelBody, OrderNewBody, Side, TimeInForce, TradeBody, PROTOCOL_VERSION};

const HEADER_LEN: usize = core::mem::size_of::<Header>();

/// Waiters for an in-flight request's ACK, keyed by the `client_order_id`
/// the server echoes back in the reply. Lets concurrent callers on the same
/// connection each get their own reply instead of racing for whichever ACK
/// happens to arrive next.
type PendingAcks = Arc<StdMutex<HashMap<u64, oneshot::Sender<AckBody>>>>;

/// A connected client. `W` is typically a half of a `TcpStream`/`UnixStream`.
pub struct TradingClient<W> {
    write_half: Mutex<W>,
    pending_acks: PendingAcks,
    next_client_order_id: AtomicU64,
    next_seqno: AtomicU64,
    /// Trade frames observed on this connection, in arrival order.
    pub trades: mpsc::UnboundedReceiver<TradeBody>,
}

impl<S> TradingClient<WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Splits `stream` and spawns the background reader task.
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = split(stream);
        let pending_acks: PendingAcks = Arc::new(StdMutex::new(HashMap::new()));
        let (trade_tx, trade_rx) = mpsc::unbounded_channel();

        tokio::spawn(read_loop(read_half, Arc::clone(&pending_acks), trade_tx));

        TradingClient {
            write_half: Mutex::new(write_half),
            pending_acks,
            next_client_order_id: AtomicU64::new(1),
            next_seqno: AtomicU64::new(1),
            trades: trade_rx,
        }
    }
}

impl<W> TradingClient<W>
where
    W: AsyncWrite + Unpin,
{
    fn allocate_client_order_id(&self) -> u64 {
        self.next_client_order_id.fetch_add(1, Ordering::Relaxed)
    }

    fn allocate_seqno(&self) -> u64 {
        self.next_seqno.fetch_add(1, Ordering::Relaxed)
    }

    /// Places a NEW order and awaits its ACK/NACK.
    pub async fn place_order(
        &self,
        instrument_id: u32,
        side: Side,
        price_ticks: i64,
        qty: i32,
        flags: TimeInForce,
    ) -> Result<AckBody, DispatchError> {
        let client_order_id = self.allocate_client_order_id();
        let body = OrderNewBody {
            client_order_id: client_order_id.into(),
            price_ticks: price_ticks.into(),
            qty: qty.into(),
            instrument_id: instrument_id.into(),
            side: side as u8,
            flags: flags.bits(),
            _reserved: 0u16.into(),
        };
        let header = Header {
            msg_type: MsgType::New as u8,
            version: PROTOCOL_VERSION,
            size: 0u16.into(),
            _pad: 0u32.into(),
            seqno: self.allocate_seqno().into(),
            ts_ns: 0u64.into(),
        };
        self.send_and_await_ack(client_order_id, header, &body).await
    }

    /// Cancels a resting order and awaits its ACK/NACK.
    pub async fn cancel_order(&self, exch_order_id: u64, client_order_id: u64, instrument_id: u32) -> Result<AckBody, DispatchError> {
        let body = OrderCancelBody {
            exch_order_id: exch_order_id.into(),
            client_order_id: client_order_id.into(),
            instrument_id: instrument_id.into(),
            reason_code: 0,
            _reserved: [0; 3],
        };
        let header = Header {
            msg_type: MsgType::Cancel as u8,
            version: PROTOCOL_VERSION,
            size: 0u16.into(),
            _pad: 0u32.into(),
            seqno: self.allocate_seqno().into(),
            ts_ns: 0u64.into(),
        };
        self.send_and_await_ack(client_order_id, header, &body).await
    }

    /// Registers a waiter for `client_order_id`'s reply, writes the frame,
    /// then awaits that specific waiter. Registering before the write (and
    /// under the write lock) guarantees the reader task can never deliver
    /// the reply before the waiter exists, and keyed-by-id delivery means a
    /// second concurrent call can never steal this call's ACK.
    async fn send_and_await_ack<B>(&self, client_order_id: u64, header: Header, body: &B) -> Result<AckBody, DispatchError>
    where
        B: zerocopy::IntoBytes + zerocopy::Immutable,
    {
        let frame = codec::pack(header, body);
        let (tx, rx) = oneshot::channel();

        {
            let mut w = self.write_half.lock().await;
            self.pending_acks.lock().unwrap().insert(client_order_id, tx);
            if let Err(e) = w.write_all(&frame).await {
                self.pending_acks.lock().unwrap().remove(&client_order_id);
                return Err(e.into());
            }
        }

        rx.await.map_err(|_| DispatchError::UnexpectedEof)
    }
}

/// Background task: reads frames off `read_half` for the lifetime of the
/// connection, delivering each ACK to the waiter registered for its
/// `client_order_id` and forwarding TRADEs to `trade_tx`.
async fn read_loop<R: AsyncRead + Unpin>(mut read_half: ReadHalf<R>, pending_acks: PendingAcks, trade_tx: mpsc::UnboundedSender<TradeBody>) {
    loop {
        let mut header_buf = [0u8; HEADER_LEN];
        if read_half.read_exact(&mut header_buf).await.is_err() {
            return;
        }
        let Ok(header) = codec::decode::<Header>(&header_buf) else {
            return;
        };
        let Ok(body_len) = codec::check_frame_size(&header) else {
            return;
        };
        let mut body_buf = vec![0u8; body_len];
        if read_half.read_exact(&mut body_buf).await.is_err() {
            return;
        }

        match MsgType::try_from(header.msg_type) {
            Ok(MsgType::Ack) => {
                if let Ok(ack) = codec::decode_body::<AckBody>(&body_buf) {
                    let waiter = pending_acks.lock().unwrap().remove(&u64::from(ack.client_order_id));
                    if let Some(tx) = waiter {
                        let _ = tx.send(ack);
                    }
                }
            }
            Ok(MsgType::Trade) => {
                if let Ok(trade) = codec::decode_body::<TradeBody>(&body_buf) {
                    let _ = trade_tx.send(trade);
                }
            }
            _ => {}
        }
    }
}
