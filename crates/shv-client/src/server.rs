//! Broker-side connection serving helpers, mirroring the teacher
//! crate's `server` module (`serve_connection`/`run_tcp_server`/
//! `TcpServable`) but blocking end to end: one thread per connection,
//! no async runtime (spec.md §5).

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use parking_lot::Mutex;
use shv_chainpack::chainpack::{pack_to_vec, unpack_from_slice};
use shv_handler::{Context, Pipeline};
use shv_proto::RpcMessage;
use shv_transport::{BlockFramer, Client, TcpTransport, TransportError};

/// Wrap an already-accepted TCP stream in a `Client` using Block framing,
/// the framing TCP connections use by default (spec.md §6.3's `tcp`
/// scheme, as opposed to `tcps`'s Serial framing).
pub fn serve_connection(stream: TcpStream) -> Client {
    Client::new(Box::new(TcpTransport::from_stream(stream)), Box::new(BlockFramer::default()))
}

/// Drive one connection's pipeline to completion: read a message, dispatch
/// it, send back whatever reply the pipeline produced, repeat until the
/// peer disconnects or a transport error ends the connection.
pub fn serve(client: Client, pipeline: Arc<Pipeline>) -> Result<(), TransportError> {
    serve_shared(Arc::new(Mutex::new(client)), pipeline)
}

/// Like [`serve`], but takes a `Client` the caller already holds behind an
/// `Arc<Mutex<_>>` — lets the caller keep a handle to send messages (e.g.
/// unsolicited signals) on the same connection from outside the serve
/// loop, which `shv-testkit`'s mock broker uses.
pub fn serve_shared(client: Arc<Mutex<Client>>, pipeline: Arc<Pipeline>) -> Result<(), TransportError> {
    let ctx = Context { peer_name: client.lock().peer_name() };
    loop {
        let bytes = match client.lock().recv_message() {
            Ok(bytes) => bytes,
            Err(TransportError::Closed) => break,
            Err(err) => {
                pipeline.run_reset(&ctx);
                return Err(err);
            }
        };
        let rv = match unpack_from_slice(&bytes) {
            Ok(rv) => rv,
            Err(err) => {
                tracing::warn!(peer = %ctx.peer_name, error = %err, "dropping malformed frame");
                continue;
            }
        };
        let msg = match RpcMessage::from_rpcvalue(&rv) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(peer = %ctx.peer_name, error = %err, "dropping unparseable message");
                continue;
            }
        };
        if let Some(Some(reply)) = pipeline.dispatch_msg(&ctx, &msg) {
            let out = pack_to_vec(&reply.to_rpcvalue()).map_err(|e| {
                TransportError::Framing(format!("failed to encode reply: {e}"))
            })?;
            client.lock().send_message(&out)?;
        }
    }
    pipeline.run_reset(&ctx);
    Ok(())
}

/// Accept connections on `addr` forever, spawning a thread running
/// `serve` with a freshly built pipeline (via `make_pipeline`) for each.
pub fn run_tcp_server<F>(addr: &str, make_pipeline: F) -> std::io::Result<()>
where
    F: Fn() -> Pipeline + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr)?;
    let make_pipeline = Arc::new(make_pipeline);
    tracing::info!(%addr, "listening");
    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(error = %err, "failed to accept connection");
                continue;
            }
        };
        let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_default();
        let make_pipeline = make_pipeline.clone();
        std::thread::spawn(move || {
            let client = serve_connection(stream);
            let pipeline = Arc::new(make_pipeline());
            if let Err(err) = serve(client, pipeline) {
                tracing::warn!(peer = %peer, error = %err, "connection ended with an error");
            }
        });
    }
    Ok(())
}
