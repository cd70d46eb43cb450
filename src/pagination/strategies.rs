//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern and always yields an
//! absolute next-page URL.

use super::types::{NextPage, PageContext, PaginationConfig, Paginator};
use crate::error::Result;
use crate::urlbuilder::UrlBuilder;
use tracing::debug;
use url::Url;

fn set_size(url: &mut UrlBuilder, size_param: Option<&String>, page_size: Option<usize>) {
    if let (Some(param), Some(size)) = (size_param, page_size) {
        url.with_query_param(param.as_str(), size.to_string());
    }
}

/// Page size echoed on the request, if the strategy sends one
fn requested_size(page: &PageContext<'_>, size_param: Option<&String>) -> Option<usize> {
    size_param
        .and_then(|p| page.query_param(p))
        .and_then(|v| v.parse().ok())
}

// ============================================================================
// Page Number Pagination
// ============================================================================

/// Page number pagination (e.g., `?page=2&per_page=100`)
///
/// Stops when the reported current page reaches the reported page count.
/// Without counts in the body it stops on a short or empty page.
#[derive(Debug, Clone)]
pub struct PageNumberPaginator {
    pub page_param: String,
    pub size_param: Option<String>,
    pub start_page: i64,
    pub current_path: Option<String>,
    pub total_path: Option<String>,
}

impl Paginator for PageNumberPaginator {
    fn first_page(&self, url: &mut UrlBuilder, page_size: Option<usize>) {
        url.with_query_param(self.page_param.as_str(), self.start_page.to_string());
        set_size(url, self.size_param.as_ref(), page_size);
    }

    fn next_page(&self, page: &PageContext<'_>) -> Result<NextPage> {
        let from_body = match &self.current_path {
            Some(path) => page.integer_at(path)?,
            None => None,
        };
        let current = from_body
            .or_else(|| page.query_param(&self.page_param).and_then(|v| v.parse().ok()))
            .unwrap_or(self.start_page);

        let total = match &self.total_path {
            Some(path) => page.integer_at(path)?,
            None => None,
        };

        let done = match total {
            Some(total) => current >= total,
            None => {
                page.records == 0
                    || requested_size(page, self.size_param.as_ref()).is_some_and(|size| page.records < size)
            }
        };
        if done {
            return Ok(NextPage::Done);
        }

        Ok(NextPage::Url(
            page.request_with_param(&self.page_param, &(current + 1).to_string())?,
        ))
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset-based pagination (e.g., `?offset=100&limit=50`)
///
/// The next offset is `offset + limit`. Stops once that reaches the reported
/// total, or on a short page when no total is reported.
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    pub offset_param: String,
    pub limit_param: String,
    pub total_path: Option<String>,
}

impl Paginator for OffsetPaginator {
    fn first_page(&self, url: &mut UrlBuilder, page_size: Option<usize>) {
        url.with_query_param(self.offset_param.as_str(), "0");
        set_size(url, Some(&self.limit_param), page_size);
    }

    fn next_page(&self, page: &PageContext<'_>) -> Result<NextPage> {
        if page.records == 0 {
            return Ok(NextPage::Done);
        }

        let offset: usize = page
            .query_param(&self.offset_param)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let limit = requested_size(page, Some(&self.limit_param));
        let next_offset = offset + limit.unwrap_or(page.records);

        let total = match &self.total_path {
            Some(path) => page.integer_at(path)?,
            None => None,
        };

        let done = match (total, limit) {
            (Some(total), _) => next_offset as i64 >= total,
            (None, Some(limit)) => page.records < limit,
            (None, None) => false,
        };
        if done {
            return Ok(NextPage::Done);
        }

        Ok(NextPage::Url(
            page.request_with_param(&self.offset_param, &next_offset.to_string())?,
        ))
    }
}

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Cursor or next link carried in the body
///
/// Common patterns:
/// - `{"links": {"next": "https://..."}, "meta": {"has_more": true}}`
/// - `{"nextRecordsUrl": "/services/data/...", "done": false}`
/// - `{"_links": {"next": "/wiki/api/v2/pages?cursor=abc"}}`
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    pub next_path: String,
    pub cursor_param: Option<String>,
    pub link_param: Option<String>,
    pub has_more_path: Option<String>,
    pub done_path: Option<String>,
    pub size_param: Option<String>,
}

impl Paginator for CursorPaginator {
    fn first_page(&self, url: &mut UrlBuilder, page_size: Option<usize>) {
        set_size(url, self.size_param.as_ref(), page_size);
    }

    fn next_page(&self, page: &PageContext<'_>) -> Result<NextPage> {
        if let Some(path) = &self.done_path {
            if page.bool_at(path)? == Some(true) {
                return Ok(NextPage::Done);
            }
        }
        if let Some(path) = &self.has_more_path {
            if page.bool_at(path)? == Some(false) {
                return Ok(NextPage::Done);
            }
        }

        let Some(value) = page.string_at(&self.next_path)? else {
            return Ok(NextPage::Done);
        };

        let cursor = match &self.link_param {
            Some(param) => {
                let link = page.request_url.join(&value)?;
                let found = link
                    .query_pairs()
                    .find(|(k, _)| k == param.as_str())
                    .map(|(_, v)| v.into_owned());
                match found {
                    Some(cursor) if !cursor.is_empty() => cursor,
                    _ => return Ok(NextPage::Done),
                }
            }
            None => value,
        };

        match &self.cursor_param {
            Some(param) => Ok(NextPage::Url(page.request_with_param(param, &cursor)?)),
            None => Ok(NextPage::Url(page.request_url.join(&cursor)?.to_string())),
        }
    }
}

// ============================================================================
// Link Header Pagination
// ============================================================================

/// Link header pagination (RFC 5988)
///
/// Follows `Link: <https://api.example.com/items?page=2>; rel="next"`.
#[derive(Debug, Clone)]
pub struct LinkHeaderPaginator {
    pub rel: String,
    pub size_param: Option<String>,
}

impl Paginator for LinkHeaderPaginator {
    fn first_page(&self, url: &mut UrlBuilder, page_size: Option<usize>) {
        set_size(url, self.size_param.as_ref(), page_size);
    }

    fn next_page(&self, page: &PageContext<'_>) -> Result<NextPage> {
        let next = page
            .headers
            .get_all("link")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|header| parse_link_header(header, &self.rel));

        match next {
            Some(url) => Ok(NextPage::Url(page.request_url.join(&url)?.to_string())),
            None => Ok(NextPage::Done),
        }
    }
}

/// Parse a Link header and extract the URL for the given rel.
///
/// Link targets are read between `<` and `>` first, so commas inside a
/// URL do not split the entry.
pub fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    // Link header format: <url>; rel="next", <url>; rel="prev"
    let mut rest = header;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        let close = after.find('>')?;
        let url = &after[..close];
        let tail = &after[close + 1..];
        let params_end = tail.find('<').unwrap_or(tail.len());
        let params = &tail[..params_end];
        rest = &tail[params_end..];

        let rels = params
            .split(';')
            .map(|segment| segment.trim().trim_end_matches(',').trim())
            .find_map(|segment| segment.strip_prefix("rel="))
            .map(|r| r.trim_matches('"').trim_matches('\''));

        // rel may hold several space-separated values
        if rels.is_some_and(|r| r.split_whitespace().any(|rel| rel == target_rel)) {
            return Some(url.to_string());
        }
    }

    None
}

// ============================================================================
// Page Token Pagination
// ============================================================================

/// Token returned in the body and echoed back as a query parameter
/// (e.g., `nextPageToken`, `page_token`)
#[derive(Debug, Clone)]
pub struct PageTokenPaginator {
    pub token_param: String,
    pub token_path: String,
    pub size_param: Option<String>,
    pub stop_on_empty: bool,
}

impl Paginator for PageTokenPaginator {
    fn first_page(&self, url: &mut UrlBuilder, page_size: Option<usize>) {
        set_size(url, self.size_param.as_ref(), page_size);
    }

    fn next_page(&self, page: &PageContext<'_>) -> Result<NextPage> {
        if self.stop_on_empty && page.records == 0 {
            return Ok(NextPage::Done);
        }
        match page.string_at(&self.token_path)? {
            Some(token) => Ok(NextPage::Url(page.request_with_param(&self.token_param, &token)?)),
            None => Ok(NextPage::Done),
        }
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - single request
#[derive(Debug, Clone, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn first_page(&self, _url: &mut UrlBuilder, _page_size: Option<usize>) {}

    fn next_page(&self, _page: &PageContext<'_>) -> Result<NextPage> {
        Ok(NextPage::Done)
    }
}

// ============================================================================
// Engine
// ============================================================================

impl PaginationConfig {
    /// Build the strategy for this configuration
    pub fn paginator(&self) -> Box<dyn Paginator> {
        match self.clone() {
            PaginationConfig::None => Box::new(NoPaginator),
            PaginationConfig::PageNumber {
                page_param,
                size_param,
                start_page,
                current_path,
                total_path,
            } => Box::new(PageNumberPaginator {
                page_param,
                size_param,
                start_page,
                current_path,
                total_path,
            }),
            PaginationConfig::Offset {
                offset_param,
                limit_param,
                total_path,
            } => Box::new(OffsetPaginator {
                offset_param,
                limit_param,
                total_path,
            }),
            PaginationConfig::Cursor {
                next_path,
                cursor_param,
                link_param,
                has_more_path,
                done_path,
                size_param,
            } => Box::new(CursorPaginator {
                next_path,
                cursor_param,
                link_param,
                has_more_path,
                done_path,
                size_param,
            }),
            PaginationConfig::LinkHeader { rel, size_param } => {
                Box::new(LinkHeaderPaginator { rel, size_param })
            }
            PaginationConfig::PageToken {
                token_param,
                token_path,
                size_param,
                stop_on_empty,
            } => Box::new(PageTokenPaginator {
                token_param,
                token_path,
                size_param,
                stop_on_empty,
            }),
        }
    }
}

/// Compute the caller-facing `NextPage` token for a fetched page.
///
/// Returns an empty string when there are no more pages. A next URL equal
/// to the URL just fetched is treated as the end, so a provider that echoes
/// its last page can never loop the caller.
pub fn next_page_token(paginator: &dyn Paginator, page: &PageContext<'_>) -> Result<String> {
    match paginator.next_page(page)? {
        NextPage::Url(next) if same_url(&next, page.request_url) => {
            debug!(url = %next, "Next page repeats the current page, stopping");
            Ok(String::new())
        }
        next => Ok(next.into_token()),
    }
}

fn same_url(candidate: &str, current: &Url) -> bool {
    Url::parse(candidate).is_ok_and(|u| &u == current)
}
