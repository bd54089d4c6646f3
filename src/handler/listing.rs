//! Directory listing module
//!
//! Renders an HTML index for directories that have no index file.

use crate::error::ServeError;
use std::fmt::Write;
use std::path::Path;
use tokio::fs;

/// One row of the listing
#[derive(Debug, PartialEq, Eq)]
struct ListingEntry {
    /// Text shown to the user (`name/` for directories, `name@` for links)
    display: String,
    /// Percent-encoded relative link
    href: String,
}

/// Render the listing page for `dir`
///
/// `display_path` is the decoded request path, shown in the title.
pub async fn render(dir: &Path, display_path: &str) -> Result<String, ServeError> {
    let entries = read_entries(dir).await?;
    Ok(render_html(display_path, &entries))
}

async fn read_entries(dir: &Path) -> Result<Vec<ListingEntry>, ServeError> {
    let mut read_dir = fs::read_dir(dir)
        .await
        .map_err(|e| ServeError::from_io(dir, e))?;

    let mut names = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| ServeError::from_io(dir, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_link = entry
            .file_type()
            .await
            .is_ok_and(|t| t.is_symlink());
        // Follow links so a link to a directory still gets the slash
        let is_dir = fs::metadata(entry.path())
            .await
            .is_ok_and(|m| m.is_dir());
        names.push((name, is_dir, is_link));
    }
    names.sort_by_key(|(name, _, _)| name.to_lowercase());

    Ok(names
        .into_iter()
        .map(|(name, is_dir, is_link)| listing_entry(&name, is_dir, is_link))
        .collect())
}

fn listing_entry(name: &str, is_dir: bool, is_link: bool) -> ListingEntry {
    let encoded = urlencoding::encode(name);
    let (mut display, href) = if is_dir {
        (format!("{name}/"), format!("{encoded}/"))
    } else {
        (name.to_string(), encoded.into_owned())
    };
    if is_link {
        display = format!("{name}@");
    }
    ListingEntry { display, href }
}

fn render_html(display_path: &str, entries: &[ListingEntry]) -> String {
    let title = format!("Directory listing for {}", escape_html(display_path));
    let mut html = format!(
        "<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<hr>\n<ul>\n"
    );
    for entry in entries {
        // Writing into a String cannot fail
        let _ = writeln!(
            html,
            "<li><a href=\"{}\">{}</a></li>",
            escape_html(&entry.href),
            escape_html(&entry.display)
        );
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    html
}

/// Escape text for use in HTML content and quoted attributes
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
