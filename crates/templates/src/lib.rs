//! Cached HTTP fetching for small remote assets
//!
//! Prompt templates, formatting instructions, and phoneme lexicons live
//! behind HTTP URLs in the organisation configuration. This crate serves
//! them through a process-wide cache with a serve-stale-while-refreshing
//! policy so a slow or flaky template host never sits on the request path.

pub mod fetcher;

pub use fetcher::TemplateFetcher;
