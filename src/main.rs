use std::process::ExitCode;
use std::sync::Arc;

use csp_serve::config::{self, AppState};
use csp_serve::error::StartupError;
use csp_serve::{logger, server};
use tokio::sync::Notify;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger::log_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), StartupError> {
    let cfg = config::Config::load()?;
    logger::init(&cfg).map_err(StartupError::Logger)?;

    // Create the Tokio runtime, sizing the worker pool from config
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build().map_err(StartupError::Runtime)?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), StartupError> {
    let addr = cfg.get_socket_addr()?;
    let state = Arc::new(AppState::new(cfg)?);
    let listener = server::create_listener(addr)?;

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown)).map_err(StartupError::Signal)?;

    let local_addr = listener.local_addr().unwrap_or(addr);
    logger::log_server_start(&local_addr, &state.root, &state.config);

    server::start_server_loop(listener, state, shutdown).await;
    Ok(())
}
