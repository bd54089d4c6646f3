//! Static file serving module
//!
//! Maps request paths onto the serving root, enforces containment, and
//! builds file responses.

use crate::config::HttpConfig;
use crate::error::ServeError;
use crate::handler::listing;
use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Outcome of mapping a request path onto the serving root
#[derive(Debug)]
pub enum Resolved {
    /// Regular file, either requested directly or a directory's index file
    File { path: PathBuf, metadata: Metadata },
    /// Directory without an index file
    Listing(PathBuf),
    /// Directory requested without its trailing slash
    Redirect(String),
}

/// Serve a request from the serving root
pub async fn serve(
    ctx: &RequestContext<'_>,
    root: &Path,
    http: &HttpConfig,
) -> Response<Full<Bytes>> {
    let result = match resolve(ctx, root, http).await {
        Ok(Resolved::File { path, metadata }) => serve_file(ctx, &path, &metadata).await,
        Ok(Resolved::Listing(dir)) => serve_listing(ctx, &dir).await,
        Ok(Resolved::Redirect(location)) => Ok(http::build_301_response(&location)),
        Err(e) => Err(e),
    };

    result.unwrap_or_else(|err| match err {
        ServeError::NotFound => http::build_404_response(),
        ServeError::Io { .. } => {
            logger::log_error(&err.to_string());
            http::build_500_response()
        }
    })
}

/// Percent-decode a request path; invalid UTF-8 is replaced
pub fn decode_path(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

/// Translate a decoded URL path into a filesystem path under `root`
///
/// The path is normalized first: empty segments and `.` are skipped and
/// `..` removes the segment before it, stopping at `root`. Of what
/// remains, only plain name segments are joined; anything holding a
/// backslash, a NUL, or a root or drive prefix is dropped.
pub fn translate_path(root: &Path, decoded: &str) -> PathBuf {
    let mut segments = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    segments
        .into_iter()
        .filter(|segment| is_plain_segment(segment))
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

fn is_plain_segment(segment: &str) -> bool {
    if segment.contains(['\0', '\\']) {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Resolve a request against the serving root
///
/// `root` must already be canonical.
pub async fn resolve(
    ctx: &RequestContext<'_>,
    root: &Path,
    http: &HttpConfig,
) -> Result<Resolved, ServeError> {
    let decoded = decode_path(ctx.path);
    let trailing_slash = decoded.ends_with('/');
    let target = contained(root, &translate_path(root, &decoded), ctx.path).await?;
    let metadata = fs::metadata(&target)
        .await
        .map_err(|e| ServeError::from_io(&target, e))?;

    if !metadata.is_dir() {
        // A file addressed like a directory does not exist
        if trailing_slash {
            return Err(ServeError::NotFound);
        }
        return Ok(Resolved::File {
            path: target,
            metadata,
        });
    }

    if !trailing_slash {
        let location = match ctx.query {
            Some(q) => format!("{}/?{q}", ctx.path),
            None => format!("{}/", ctx.path),
        };
        return Ok(Resolved::Redirect(location));
    }

    for index_file in &http.index_files {
        let Ok(candidate) = contained(root, &target.join(index_file), ctx.path).await else {
            continue;
        };
        if let Ok(metadata) = fs::metadata(&candidate).await {
            if metadata.is_file() {
                return Ok(Resolved::File {
                    path: candidate,
                    metadata,
                });
            }
        }
    }

    if http.directory_listing {
        Ok(Resolved::Listing(target))
    } else {
        Err(ServeError::NotFound)
    }
}

/// Canonicalize `path` and require it to stay under `root`
///
/// Lexical translation already removes `..`; this catches symlinks that
/// point outside the root.
async fn contained(root: &Path, path: &Path, request_path: &str) -> Result<PathBuf, ServeError> {
    let canonical = fs::canonicalize(path)
        .await
        .map_err(|e| ServeError::from_io(path, e))?;
    if canonical.starts_with(root) {
        Ok(canonical)
    } else {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {request_path} -> {}",
            canonical.display()
        ));
        Err(ServeError::NotFound)
    }
}

async fn serve_file(
    ctx: &RequestContext<'_>,
    path: &Path,
    metadata: &Metadata,
) -> Result<Response<Full<Bytes>>, ServeError> {
    let last_modified = metadata.modified().ok();
    let last_modified_header = last_modified.map(cache::http_date);

    if let (Some(modified), Some(header)) = (last_modified, &last_modified_header) {
        if cache::is_not_modified(ctx.if_modified_since, ctx.has_if_none_match, modified) {
            return Ok(http::build_304_response(header));
        }
    }

    let content = fs::read(path)
        .await
        .map_err(|e| ServeError::from_io(path, e))?;

    Ok(http::build_content_response(
        Bytes::from(content),
        mime::content_type_for(path),
        last_modified_header.as_deref(),
        ctx.is_head,
    ))
}

async fn serve_listing(
    ctx: &RequestContext<'_>,
    dir: &Path,
) -> Result<Response<Full<Bytes>>, ServeError> {
    let html = listing::render(dir, &decode_path(ctx.path)).await?;
    Ok(http::build_content_response(
        Bytes::from(html),
        "text/html; charset=utf-8",
        None,
        ctx.is_head,
    ))
}
