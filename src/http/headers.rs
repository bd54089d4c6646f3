//! Security header middleware
//!
//! The header set mirrors the hosting platform's production policy and must
//! stay byte-identical to it. It is attached to every response the service
//! produces, whatever the status.

use hyper::header::{
    HeaderName, HeaderValue, CONTENT_SECURITY_POLICY, SERVER, X_CONTENT_TYPE_OPTIONS,
    X_FRAME_OPTIONS,
};
use hyper::Response;

pub const CONTENT_SECURITY_POLICY_VALUE: &str = concat!(
    "default-src 'self'; ",
    "script-src 'self' 'unsafe-eval' 'wasm-unsafe-eval' https://cdn.jsdelivr.net blob:; ",
    "style-src 'self'; ",
    "font-src 'self'; ",
    "img-src 'self' data: blob:; ",
    "connect-src 'self' vitals.vercel-insights.com https://cdn.jsdelivr.net https://huggingface.co https://cdn-lfs.hf.co https://cdn-lfs-us-1.hf.co https://cdn-lfs.huggingface.co; ",
    "worker-src 'self' blob:; ",
    "frame-ancestors 'none'; ",
    "base-uri 'self'; ",
    "form-action 'self'",
);

/// The fixed header set, in emission order
pub const SECURITY_HEADERS: [(HeaderName, &str); 3] = [
    (CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY_VALUE),
    (X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (X_FRAME_OPTIONS, "DENY"),
];

/// Attach the security header set to a response
///
/// Existing values under the same names are replaced, so each header
/// appears exactly once.
pub fn with_security_headers<B>(mut response: Response<B>) -> Response<B> {
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

/// Attach the `Server` header
pub fn with_server_name<B>(mut response: Response<B>, server_name: &HeaderValue) -> Response<B> {
    response.headers_mut().insert(SERVER, server_name.clone());
    response
}
