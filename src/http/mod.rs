//! HTTP protocol layer module
//!
//! Protocol-level building blocks shared by the handlers: the security
//! header middleware, content types, cache validators and response builders.

pub mod cache;
pub mod headers;
pub mod mime;
pub mod response;

// Re-export commonly used items
pub use headers::{with_security_headers, with_server_name, SECURITY_HEADERS};
pub use response::{
    build_301_response, build_304_response, build_404_response, build_500_response,
    build_501_response, build_content_response,
};
