use std::io::Read;

use reqwest::{Client, ClientBuilder, Response};
use scraper::{ElementRef, Html, Node};
use tracing::debug;

use crate::config::Config;
use crate::error::Result;

/// Upper bound on how much of a response body is read and parsed.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Builds the HTTP client shared by every fetch worker.
pub fn build_client(config: &Config) -> Result<Client> {
    let client = ClientBuilder::new()
        .timeout(config.fetch_timeout)
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(10)
        .build()?;
    Ok(client)
}

/// Reads at most `limit` bytes of the response body, dropping the rest.
///
/// This is where fetched bodies get capped. A transport error mid-body fails
/// the whole read, and the caller reports it as a failed fetch.
pub async fn read_limited_body(mut response: Response, limit: usize) -> Result<Vec<u8>> {
    let mut body = Vec::new();

    while let Some(chunk) = response.chunk().await? {
        let remaining = limit - body.len();
        if chunk.len() >= remaining {
            body.extend_from_slice(&chunk[..remaining]);
            debug!(url = %response.url(), limit, "response body truncated");
            break;
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Parses up to [`MAX_BODY_BYTES`] of `reader` as HTML and returns the text of
/// the first `<title>` element in document order.
///
/// The parser is tolerant, so malformed markup never fails. It just yields
/// whatever tree the tree builder could recover. Fetched pages arrive here
/// already capped by [`read_limited_body`]; for any other reader, a read error
/// ends the input and the bytes read so far are still parsed.
pub fn extract_title<R: Read>(reader: R) -> Option<String> {
    let mut buf = Vec::new();
    if let Err(err) = reader.take(MAX_BODY_BYTES as u64).read_to_end(&mut buf) {
        debug!(error = %err, read = buf.len(), "body read failed, parsing partial content");
    }

    let html = String::from_utf8_lossy(&buf);
    let document = Html::parse_document(&html);
    find_title(document.root_element())
}

// Pre-order DFS; a title without a first text child does not count as a match.
fn find_title(element: ElementRef<'_>) -> Option<String> {
    if element.value().name() == "title" {
        if let Some(Node::Text(text)) = element.first_child().map(|child| child.value()) {
            let text: &str = text;
            return Some(text.to_owned());
        }
    }

    element
        .children()
        .filter_map(ElementRef::wrap)
        .find_map(find_title)
}
