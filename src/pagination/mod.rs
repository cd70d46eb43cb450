//! Pagination module
//!
//! Supports: Page Number, Offset, Cursor, Link Header, Page Token
//!
//! # Overview
//!
//! Each strategy is declared per object in the schema store and turns a
//! fetched page into the absolute URL of the next one. The caller receives
//! that URL as the opaque `NextPage` token; an empty token means the read is
//! complete. Incremental windows (`since`/`until`) live in [`window`].

mod strategies;
mod types;
pub mod window;

pub use strategies::{
    next_page_token, parse_link_header, CursorPaginator, LinkHeaderPaginator, NoPaginator,
    OffsetPaginator, PageNumberPaginator, PageTokenPaginator,
};
pub use types::{NextPage, PageContext, PaginationConfig, Paginator};
pub use window::{apply_window, IncrementalConfig, Window};

#[cfg(test)]
mod tests;
