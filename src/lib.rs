//! Local static file server that attaches the production security header
//! policy (`Content-Security-Policy`, `X-Content-Type-Options`,
//! `X-Frame-Options`) to every response.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
