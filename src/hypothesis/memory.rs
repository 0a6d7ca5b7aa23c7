use std::cell::RefCell;

use super::{AnnotationSource, SearchQuery};
use crate::error::SourceError;
use crate::model::{RawAnnotation, RawGroup, SearchPage};

/// In-process stand-in for the Hypothesis search API that records every query.
pub struct MemorySource {
    rows: RefCell<Vec<RawAnnotation>>,
    groups: Vec<RawGroup>,
    page_limit: u32,
    queries: RefCell<Vec<SearchQuery>>,
}

impl MemorySource {
    pub fn new(rows: Vec<RawAnnotation>, groups: Vec<RawGroup>) -> Self {
        Self {
            rows: RefCell::new(rows),
            groups,
            page_limit: 2,
            queries: RefCell::new(Vec::new()),
        }
    }

    pub fn upsert(&self, row: RawAnnotation) {
        let mut rows = self.rows.borrow_mut();
        rows.retain(|r| r.id != row.id);
        rows.push(row);
    }

    pub fn remove(&self, id: &str) {
        self.rows.borrow_mut().retain(|r| r.id != id);
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.borrow().clone()
    }

    pub fn reset_queries(&self) {
        self.queries.borrow_mut().clear();
    }

    /// Full document scans, i.e. uri queries that are not one-row probes.
    pub fn refetches_of(&self, uri: &str) -> usize {
        self.queries
            .borrow()
            .iter()
            .filter(|q| q.uri.as_deref() == Some(uri) && q.limit != Some(1))
            .count()
    }
}

impl AnnotationSource for MemorySource {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SourceError> {
        self.queries.borrow_mut().push(query.clone());

        let mut matching: Vec<RawAnnotation> = self
            .rows
            .borrow()
            .iter()
            .filter(|r| query.uri.as_deref().is_none_or(|uri| r.uri == uri))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.updated.cmp(&b.updated));
        let total = matching.len() as u64;

        let limit = query.limit.unwrap_or(self.page_limit) as usize;
        let rows = matching
            .into_iter()
            .filter(|r| {
                query
                    .search_after
                    .as_deref()
                    .is_none_or(|after| r.updated.as_str() > after)
            })
            .take(limit)
            .collect();

        Ok(SearchPage { rows, total })
    }

    async fn list_groups(&self) -> Result<Vec<RawGroup>, SourceError> {
        Ok(self.groups.clone())
    }
}
