// Connection handling module
// Serves one accepted TCP connection with the header-injecting service

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppState;
use crate::handler;
use crate::http::{with_security_headers, with_server_name};
use crate::logger;

/// Handle a single connection in a spawned task.
///
/// This function:
/// 1. Wraps the TCP stream in `TokioIo`
/// 2. Configures HTTP/1.1 keep-alive and the idle timeout
/// 3. Serves the connection with the request handler, passing every
///    response through the header middleware
///
/// `keep_alive_timeout` bounds how long hyper waits for the next request
/// head, so an idle keep-alive connection is closed after that many
/// seconds while a response still being written is never cut off. Zero
/// turns keep-alive off.
///
/// Malformed requests are rejected inside hyper and surface here as a
/// connection error.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
pub fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let keep_alive_timeout = state.config.performance.keep_alive_timeout;
        let mut builder = http1::Builder::new();
        builder.timer(TokioTimer::new());
        builder.keep_alive(keep_alive_timeout > 0);
        if keep_alive_timeout > 0 {
            builder.header_read_timeout(Duration::from_secs(keep_alive_timeout));
        }

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let state = Arc::clone(&service_state);
                async move {
                    let response = handler::handle_request(req, Arc::clone(&state), peer_addr)
                        .await?;
                    Ok::<_, std::convert::Infallible>(with_server_name(
                        with_security_headers(response),
                        &state.server_name,
                    ))
                }
            }),
        );

        if let Err(err) = conn.await {
            // An idle keep-alive connection reaching its timeout is routine
            if !err.is_timeout() {
                logger::log_connection_error(&err);
            }
        }
    });
}
