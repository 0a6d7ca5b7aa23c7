use anyhow::Result;
use chrono::FixedOffset;

use crate::hypothesis::{AnnotationSource, SearchQuery};
use crate::model::{Annotation, Groups};
use crate::render::{self, Header};
use crate::state::DocumentState;

/// Snapshot of every live annotation on one URI.
#[derive(Debug, Clone)]
pub struct Document {
    pub title: String,
    pub created: String,
    pub updated: String,
    pub total: u64,
    pub annotations: Vec<Annotation>,
    pub content: String,
}

impl Document {
    pub fn filename(&self) -> Result<String> {
        render::output_filename(&self.created, &self.title)
    }
}

#[derive(Debug)]
pub enum DocumentStatus {
    Unchanged,
    /// The URI has no annotations left.
    Empty,
    Changed(Document),
}

pub struct Aggregator<'a, S> {
    source: &'a S,
    groups: &'a Groups,
    utc_offset: FixedOffset,
}

impl<'a, S: AnnotationSource> Aggregator<'a, S> {
    pub fn new(source: &'a S, groups: &'a Groups, utc_offset: FixedOffset) -> Self {
        Self {
            source,
            groups,
            utc_offset,
        }
    }

    /// Probes for changes since `previous` before paying for a full refetch.
    pub async fn refresh(&self, uri: &str, previous: &DocumentState) -> Result<DocumentStatus> {
        let probe = self
            .source
            .search(
                &SearchQuery::for_uri(uri)
                    .after(Some(&previous.timestamp))
                    .limit(1),
            )
            .await?;

        if probe.rows.is_empty() && probe.total == previous.total {
            return Ok(DocumentStatus::Unchanged);
        }

        tracing::debug!(
            uri,
            probe_rows = probe.rows.len(),
            total = probe.total,
            previous_total = previous.total,
            "document changed"
        );
        // Rescan from the start: deletions leave nothing after the old timestamp.
        self.fetch(uri).await
    }

    pub async fn fetch(&self, uri: &str) -> Result<DocumentStatus> {
        let mut cursor: Option<String> = None;
        let mut annotations = Vec::new();

        let total = loop {
            let page = self
                .source
                .search(&SearchQuery::for_uri(uri).after(cursor.as_deref()))
                .await?;
            let Some(last) = page.rows.last() else {
                break page.total;
            };
            cursor = Some(last.updated.clone());
            for row in &page.rows {
                annotations.push(Annotation::parse(row)?);
            }
        };

        if annotations.is_empty() {
            return Ok(DocumentStatus::Empty);
        }

        Ok(DocumentStatus::Changed(self.assemble(
            uri,
            annotations,
            total,
        )?))
    }

    fn assemble(&self, uri: &str, mut annotations: Vec<Annotation>, total: u64) -> Result<Document> {
        annotations.sort_by_cached_key(|a| a.sort_key());

        let first = &annotations[0];
        let created = annotations
            .iter()
            .map(|a| a.created.as_str())
            .min()
            .unwrap_or_default()
            .to_string();
        let updated = annotations
            .iter()
            .map(|a| a.updated.as_str())
            .max()
            .unwrap_or_default()
            .to_string();

        let group = match self.groups.display(&first.group) {
            Some(display) => display.to_string(),
            None => {
                tracing::warn!(uri, group = %first.group, "unknown group");
                first.group.clone()
            }
        };

        let content = render::render_document(
            &Header {
                title: &first.title,
                url: &first.uri,
                group: &group,
                created: &render::format_local_time(&created, self.utc_offset)?,
                updated: &render::format_local_time(&updated, self.utc_offset)?,
            },
            &annotations,
        );

        Ok(Document {
            title: first.title.clone(),
            created,
            updated,
            total,
            annotations,
            content,
        })
    }
}
