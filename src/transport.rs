//! Accepts connections on a Unix-domain or TCP endpoint and spawns one
//! dispatcher task per connection.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::{TcpListener, UnixListener};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::engine::Engine;

/// Where the server listens.
#[derive(Debug, Clone)]
pub enum BindAddr {
    Tcp(String),
    Unix(PathBuf),
}

enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

/// Binds `addr` and runs the accept loop until the process is asked to stop
/// (via `shutdown`, a `CancellationToken`-free simple future the caller
/// supplies — e.g. `tokio::signal::ctrl_c()`). Each accepted connection gets
/// its own task and a clone of the shared, mutex-guarded `engine`.
pub async fn serve(addr: BindAddr, engine: Arc<Mutex<Engine>>, shutdown: impl std::future::Future<Output = ()>) -> std::io::Result<()> {
    let listener = match &addr {
        BindAddr::Tcp(bind) => {
            let l = TcpListener::bind(bind).await?;
            info!(bind, "listening on TCP");
            Listener::Tcp(l)
        }
        BindAddr::Unix(path) => {
            let _ = std::fs::remove_file(path);
            let l = UnixListener::bind(path)?;
            info!(path = %path.display(), "listening on Unix socket");
            Listener::Unix(l)
        }
    };

    tokio::pin!(shutdown);
    let mut next_conn_id: u64 = 0;

    loop {
        tokio::select! {
            accepted = accept_one(&listener) => {
                let (stream_kind, label) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        continue;
                    }
                };
                next_conn_id += 1;
                let conn_label = format!("{label}#{next_conn_id}");
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    let result = match stream_kind {
                        AcceptedStream::Tcp(s) => crate::dispatcher::run(s, engine, &conn_label).await,
                        AcceptedStream::Unix(s) => crate::dispatcher::run(s, engine, &conn_label).await,
                    };
                    if let Err(e) = result {
                        error!(conn_label, error = %e, "connection ended with protocol error");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("shutdown requested, no longer accepting new connections");
                return Ok(());
            }
        }
    }
}

enum AcceptedStream {
    Tcp(tokio::net::TcpStream),
    Unix(tokio::net::UnixStream),
}

async fn accept_one(listener: &Listener) -> std::io::Result<(AcceptedStream, &'static str)> {
    match listener {
        Listener::Tcp(l) => {
            let (stream, peer) = l.accept().await?;
            info!(%peer, "accepted TCP connection");
            Ok((AcceptedStream::Tcp(stream), "tcp"))
        }
        Listener::Unix(l) => {
            let (stream, _) = l.accept().await?;
            info!("accepted Unix connection");
            Ok((AcceptedStream::Unix(stream), "unix"))
        }
    }
}
