//! Page-by-page traversal of one query's result chain.
//!
//! A walk starts from a [`Query`] (or a literal URL), fetches a page, decodes
//! its entries, and follows the page's `link[rel=next]` until a page has no
//! next link. Pages are fetched strictly one after another; the next URL is
//! only known once the current page has been parsed.
//!
//! The upstream feed is assumed not to produce cyclic next links; the walker
//! does not detect them.

use super::decoder::decode;
use super::document::{ATOM_NS, MalformedXml, parse_document};
use super::query::Query;
use crate::api::FeedFetcher;
use crate::error::FetchError;
use crate::models::ContractRecord;
use crate::utils::truncate_for_log;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// One fetched and decoded document.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub records: Vec<ContractRecord>,
    /// Literal `href` of the root's `link[rel=next]`, if non-empty.
    pub next: Option<String>,
}

/// Parse a feed document and decode all of its entries.
///
/// Only direct `entry` children of the Atom `feed` root are decoded, in
/// document order. The next link is the first root-level `link` with
/// `rel="next"`; a blank `href` means there is no next page.
///
/// # Arguments
///
/// * `xml` - Response body of one feed request
///
/// # Returns
///
/// The decoded page, or [`MalformedXml`] if the body is not well-formed XML
/// or its root is not an Atom `feed`.
pub fn parse_page(xml: &str) -> Result<FeedPage, MalformedXml> {
    let root = parse_document(xml)?;
    if !root.is(ATOM_NS, "feed") {
        return Err(MalformedXml(format!(
            "expected Atom feed root, found <{}>",
            root.name()
        )));
    }

    let records = root.children_named(ATOM_NS, "entry").map(decode).collect();
    let next = root
        .children_named(ATOM_NS, "link")
        .find(|link| link.attribute("rel") == Some("next"))
        .and_then(|link| link.attribute("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string);

    Ok(FeedPage { records, next })
}

/// URL to request after `current`.
///
/// An absolute `href` is returned exactly as the feed wrote it. A relative
/// one is joined onto `current`, which percent-encodes characters such as
/// quotes and spaces.
fn resolve_next(current: &str, href: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    match Url::parse(current).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Walks pagination chains using a shared fetcher.
///
/// The walker keeps no per-walk state, so the same walker can run many
/// walks concurrently and a walk can be restarted from its query.
pub struct FeedWalker<'a, F> {
    fetcher: &'a F,
    base_url: Url,
    cancel: CancellationToken,
}

impl<'a, F> FeedWalker<'a, F>
where
    F: FeedFetcher,
{
    pub fn new(fetcher: &'a F, base_url: Url) -> Self {
        Self {
            fetcher,
            base_url,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop requesting further pages once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Walk every page of `query`.
    pub async fn walk_query(&self, query: &Query) -> Result<Vec<ContractRecord>, FetchError> {
        self.walk_url(query.to_url(&self.base_url).to_string()).await
    }

    /// Walk every page starting at a literal URL.
    ///
    /// Records come back in page order, then entry order within each page.
    ///
    /// # Arguments
    ///
    /// * `start` - URL of the first page
    ///
    /// # Returns
    ///
    /// All records of the chain, or the first [`FetchError`] hit. A failed
    /// walk returns no partial records.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Transport`] when a page cannot be fetched
    /// - [`FetchError::Malformed`] when a page is not a feed document
    /// - [`FetchError::Cancelled`] when the cancellation token trips between pages
    #[instrument(level = "info", skip_all, fields(start = %start))]
    pub async fn walk_url(&self, start: String) -> Result<Vec<ContractRecord>, FetchError> {
        let mut records = Vec::new();
        let mut pages = 0usize;
        let mut cursor = Some(start);

        while let Some(url) = cursor.take() {
            if self.cancel.is_cancelled() {
                warn!(%url, pages, "Walk cancelled; not requesting further pages");
                return Err(FetchError::Cancelled { url });
            }

            let body = self.fetcher.fetch(&url).await?;
            let page = match parse_page(&body) {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        %url,
                        error = %e,
                        body_preview = %truncate_for_log(&body, 300),
                        "Response is not a feed document"
                    );
                    return Err(FetchError::Malformed {
                        url,
                        reason: e.to_string(),
                    });
                }
            };

            pages += 1;
            debug!(
                page = pages,
                entries = page.records.len(),
                first_piid = page.records.first().and_then(|r| r.get("PIID")).unwrap_or(""),
                has_next = page.next.is_some(),
                "Decoded feed page"
            );
            records.extend(page.records);
            cursor = page.next.map(|href| resolve_next(&url, &href));
        }

        info!(pages, records = records.len(), "Walk complete");
        Ok(records)
    }
}
