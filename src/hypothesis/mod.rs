//! Hypothesis Annotation Source
//!
//! Read-only access to a user's annotations on the Hypothesis service.
//!
//! # Semantics relied on by the sync
//!
//! - Results are always sorted ascending by `updated`
//! - `search_after` returns only rows strictly after the given `updated` value
//! - `total` counts every row matching the uri/user filter and ignores
//!   `search_after`, so a one-row probe still reports the full document size
//!
//! # Usage
//!
//! ```rust,ignore
//! use hypobackup::hypothesis::{AnnotationSource, HypothesisClient, SearchQuery};
//!
//! let client = HypothesisClient::new(&cfg.hypothesis)?;
//! let page = client.search(&SearchQuery::all().after(Some("2024-01-01T00:00:00+00:00"))).await?;
//! ```

mod client;
#[cfg(test)]
pub(crate) mod memory;

pub use client::HypothesisClient;

use crate::error::SourceError;
use crate::model::{RawGroup, SearchPage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub search_after: Option<String>,
    pub uri: Option<String>,
    pub limit: Option<u32>,
}

impl SearchQuery {
    /// Every annotation from the epoch, using the source's page size.
    pub fn all() -> Self {
        Self {
            search_after: None,
            uri: None,
            limit: None,
        }
    }

    pub fn for_uri(uri: &str) -> Self {
        Self {
            uri: Some(uri.to_string()),
            ..Self::all()
        }
    }

    pub fn after(mut self, timestamp: Option<&str>) -> Self {
        self.search_after = timestamp.map(|t| t.to_string());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[allow(async_fn_in_trait)]
pub trait AnnotationSource {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SourceError>;

    async fn list_groups(&self) -> Result<Vec<RawGroup>, SourceError>;
}
