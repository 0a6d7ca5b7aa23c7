use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::SourceError;

/// One page of `/search` results. `total` counts every annotation matching
/// the user and uri filters, regardless of `search_after`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchPage {
    pub rows: Vec<RawAnnotation>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAnnotation {
    pub id: String,
    pub created: String,
    pub updated: String,
    pub uri: String,
    pub group: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub document: RawDocument,
    #[serde(default)]
    pub target: Vec<RawTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawDocument {
    #[serde(default)]
    pub title: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Vec<RawSelector>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RawSelector {
    TextQuoteSelector {
        exact: String,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
    },
    TextPositionSelector {
        start: u64,
        #[serde(default)]
        end: u64,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub links: RawGroupLinks,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawGroupLinks {
    #[serde(default)]
    pub html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationKind {
    /// Note attached to the whole page, no selector.
    PageNote,
    /// Note anchored to quoted text.
    Highlight { quote: String, offset: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub id: String,
    pub created: String,
    pub updated: String,
    pub title: String,
    pub uri: String,
    pub group: String,
    pub note: String,
    pub tags: Vec<String>,
    pub kind: AnnotationKind,
}

impl Annotation {
    pub fn parse(raw: &RawAnnotation) -> Result<Self, SourceError> {
        let target = raw
            .target
            .first()
            .ok_or_else(|| SourceError::invalid_record(&raw.id, "missing target"))?;

        let kind = match &target.selector {
            None => AnnotationKind::PageNote,
            Some(selectors) => {
                let mut quote = String::new();
                let mut offset = String::from("0");
                for selector in selectors {
                    match selector {
                        RawSelector::TextQuoteSelector {
                            exact,
                            prefix,
                            suffix,
                        } => {
                            quote = format!("{}**{}**{}", prefix.trim(), exact, suffix.trim());
                        }
                        RawSelector::TextPositionSelector { start, .. } => {
                            offset = start.to_string();
                        }
                        RawSelector::Other => {}
                    }
                }
                AnnotationKind::Highlight {
                    quote: flatten_whitespace(quote.trim()),
                    offset,
                }
            }
        };

        let title = raw
            .document
            .title
            .first()
            .cloned()
            .unwrap_or_else(|| raw.uri.clone());

        Ok(Annotation {
            id: raw.id.clone(),
            created: raw.created.clone(),
            updated: raw.updated.clone(),
            title,
            uri: raw.uri.clone(),
            group: raw.group.clone(),
            note: flatten_whitespace(raw.text.trim()),
            tags: raw.tags.clone(),
            kind,
        })
    }

    pub fn offset(&self) -> &str {
        match &self.kind {
            AnnotationKind::PageNote => "0",
            AnnotationKind::Highlight { offset, .. } => offset,
        }
    }

    /// Offset left-padded to a fixed width so numeric offsets order correctly as strings.
    pub fn sort_key(&self) -> String {
        format!("{:0>10}", self.offset())
    }
}

fn flatten_whitespace(s: &str) -> String {
    s.replace(['\n', '\t'], " ")
}

/// Group id to its rendered `[name](link)` string, built once per run.
#[derive(Debug, Clone, Default)]
pub struct Groups {
    display: HashMap<String, String>,
}

impl Groups {
    pub fn from_raw(groups: &[RawGroup]) -> Self {
        let display = groups
            .iter()
            .map(|g| {
                let link = g.links.html.as_deref().unwrap_or_default();
                (g.id.clone(), format!("[{}]({})", g.name, link))
            })
            .collect();
        Self { display }
    }

    pub fn display(&self, id: &str) -> Option<&str> {
        self.display.get(id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.display.len()
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }
}
