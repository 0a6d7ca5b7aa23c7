use anyhow::Result;
use chrono::FixedOffset;
use std::collections::BTreeSet;
use std::path::Path;

use crate::aggregate::{Aggregator, DocumentStatus};
use crate::backup::BackupDir;
use crate::hypothesis::{AnnotationSource, SearchQuery};
use crate::model::Groups;
use crate::state::{DocumentState, SyncState};

pub enum SyncResult {
    Created,
    Updated,
    Deleted,
    Unchanged,
    /// Seen after the watermark but emptied before it could be fetched.
    Skipped,
}

impl SyncResult {
    pub fn record(self, stats: &mut SyncStats) {
        match self {
            SyncResult::Created => stats.created += 1,
            SyncResult::Updated => stats.updated += 1,
            SyncResult::Deleted => stats.deleted += 1,
            SyncResult::Unchanged => stats.unchanged += 1,
            SyncResult::Skipped => {}
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub created: i32,
    pub updated: i32,
    pub deleted: i32,
    pub unchanged: i32,
}

impl SyncStats {
    pub fn writes(&self) -> i32 {
        self.created + self.updated + self.deleted
    }
}

/// One complete sync cycle. The state file is only rewritten when every
/// document reconciled cleanly, so a failed run resumes from the old watermark.
pub async fn run_once<S: AnnotationSource>(
    source: &S,
    backup: &BackupDir,
    state_path: &Path,
    utc_offset: FixedOffset,
    reset: bool,
) -> Result<SyncStats> {
    let mut state = if reset {
        tracing::info!("ignoring saved state at {:?}", state_path);
        SyncState::default()
    } else {
        SyncState::load(state_path)?
    };

    let groups = Groups::from_raw(&source.list_groups().await?);
    tracing::info!(groups = groups.len(), watermark = ?state.timestamp, "starting sync");

    let stats = Reconciler::new(source, &groups, backup, utc_offset)
        .run(&mut state)
        .await?;

    state.save(state_path)?;
    Ok(stats)
}

/// URIs touched since the watermark, and where the scan ended.
struct Discovery {
    uris: BTreeSet<String>,
    cursor: Option<String>,
    total: u64,
}

pub struct Reconciler<'a, S> {
    source: &'a S,
    aggregator: Aggregator<'a, S>,
    backup: &'a BackupDir,
}

impl<'a, S: AnnotationSource> Reconciler<'a, S> {
    pub fn new(
        source: &'a S,
        groups: &'a Groups,
        backup: &'a BackupDir,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            source,
            aggregator: Aggregator::new(source, groups, utc_offset),
            backup,
        }
    }

    /// Brings the backup directory up to date and advances `state`.
    ///
    /// On error `state` may be partially updated and must not be persisted.
    pub async fn run(&self, state: &mut SyncState) -> Result<SyncStats> {
        let discovery = self.discover(state).await?;
        tracing::info!(
            documents = discovery.uris.len(),
            tracked = state.details.len(),
            "reconciling documents"
        );

        let mut stats = SyncStats::default();
        for uri in &discovery.uris {
            self.reconcile(uri, state).await?.record(&mut stats);
        }

        state.timestamp = discovery.cursor;
        state.total = discovery.total;
        Ok(stats)
    }

    async fn discover(&self, state: &SyncState) -> Result<Discovery> {
        let mut cursor = state.timestamp.clone();
        let mut uris = BTreeSet::new();

        let total = loop {
            let page = self
                .source
                .search(&SearchQuery::all().after(cursor.as_deref()))
                .await?;
            let Some(last) = page.rows.last() else {
                break page.total;
            };
            tracing::debug!(rows = page.rows.len(), after = ?cursor, "scanned updates");
            cursor = Some(last.updated.clone());
            uris.extend(page.rows.iter().map(|r| r.uri.clone()));
        };

        // Fully deleted documents leave no rows after the watermark.
        uris.extend(state.details.keys().cloned());

        Ok(Discovery {
            uris,
            cursor,
            total,
        })
    }

    async fn reconcile(&self, uri: &str, state: &mut SyncState) -> Result<SyncResult> {
        let previous = state.details.get(uri).cloned();
        let status = match &previous {
            Some(prev) => self.aggregator.refresh(uri, prev).await?,
            None => self.aggregator.fetch(uri).await?,
        };

        match status {
            DocumentStatus::Unchanged => {
                tracing::debug!(uri, "unchanged");
                Ok(SyncResult::Unchanged)
            }
            DocumentStatus::Empty => {
                let Some(prev) = previous else {
                    return Ok(SyncResult::Skipped);
                };
                self.backup.remove(&prev.filename)?;
                state.details.remove(uri);
                tracing::info!(uri, filename = %prev.filename, "document deleted");
                Ok(SyncResult::Deleted)
            }
            DocumentStatus::Changed(doc) => {
                let filename = doc.filename()?;
                self.backup.write(&filename, &doc.content)?;

                if let Some(prev) = &previous {
                    let renamed = prev.filename != filename;
                    let shared = state
                        .details
                        .iter()
                        .any(|(other, d)| other != uri && d.filename == prev.filename);
                    if renamed && !shared {
                        self.backup.remove(&prev.filename)?;
                    }
                }

                tracing::info!(uri, filename = %filename, annotations = doc.annotations.len(), "document synced");
                state.details.insert(
                    uri.to_string(),
                    DocumentState {
                        timestamp: doc.updated,
                        total: doc.total,
                        filename,
                    },
                );

                Ok(match previous {
                    Some(_) => SyncResult::Updated,
                    None => SyncResult::Created,
                })
            }
        }
    }
}
