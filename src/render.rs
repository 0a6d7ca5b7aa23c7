use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};

use crate::model::{Annotation, AnnotationKind};

/// Header values for one document. Timestamps are already localized.
pub struct Header<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub group: &'a str,
    pub created: &'a str,
    pub updated: &'a str,
}

pub fn render_document(header: &Header<'_>, annotations: &[Annotation]) -> String {
    let mut page_notes = String::new();
    let mut highlights = String::new();

    for ann in annotations {
        let tags = format_tags(&ann.tags);
        match &ann.kind {
            AnnotationKind::PageNote => {
                page_notes.push_str(&format!("\n- 笔记：{}\n\n  标签：{}\n", ann.note, tags));
            }
            AnnotationKind::Highlight { quote, .. } => {
                highlights.push_str(&format!(
                    "\n- 高亮文本：{}\n  \n  笔记：{}\n  \n  标签：{}\n",
                    quote, ann.note, tags
                ));
            }
        }
    }

    format!(
        "---\n\
         文章标题: {title}\n\
         原文链接: <{url}>\n\
         分组 ID：{group}\n\
         创建时间: {created}\n\
         更新时间: {updated}\n\
         ---\n\
         \n\
         # 文章笔记\n\
         {page_notes}\n\
         # 高亮标注\n\
         {highlights}",
        title = header.title,
        url = header.url,
        group = header.group,
        created = header.created,
        updated = header.updated,
    )
}

pub fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn format_local_time(timestamp: &str, offset: FixedOffset) -> Result<String> {
    let dt = DateTime::parse_from_rfc3339(timestamp)
        .with_context(|| format!("invalid timestamp {:?}", timestamp))?;
    Ok(dt.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Replaces characters that cannot appear in a file name.
pub fn escape_filename(name: &str) -> String {
    name.replace(['/', '"'], "_")
}

/// `<YYMMDD>_<title>.md`, dated by the timestamp's own calendar day.
pub fn output_filename(created: &str, title: &str) -> Result<String> {
    let dt = DateTime::parse_from_rfc3339(created)
        .with_context(|| format!("invalid creation timestamp {:?}", created))?;
    Ok(format!("{}_{}.md", dt.format("%y%m%d"), escape_filename(title)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shanghai() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn test_format_tags() {
        assert_eq!(format_tags(&["a".to_string(), "b".to_string()]), "#a #b");
        assert_eq!(format_tags(&[]), "");
    }

    #[test]
    fn test_format_local_time_crosses_midnight() {
        assert_eq!(
            format_local_time("2024-05-01T17:30:00.123456+00:00", shanghai()).unwrap(),
            "2024-05-02 01:30:00"
        );
    }

    #[test]
    fn test_format_local_time_rejects_garbage() {
        assert!(format_local_time("yesterday", shanghai()).is_err());
    }

    #[test]
    fn test_escape_filename() {
        assert_eq!(escape_filename(r#"a/b "c""#), "a_b _c_");
    }

    #[test]
    fn test_output_filename_uses_utc_calendar_day() {
        assert_eq!(
            output_filename("2023-12-31T20:00:00+00:00", "Year/End").unwrap(),
            "231231_Year_End.md"
        );
    }

    #[test]
    fn test_render_document_layout() {
        let header = Header {
            title: "T",
            url: "https://example.com",
            group: "[Public](https://hypothes.is/groups/__world__)",
            created: "2024-01-01 08:00:00",
            updated: "2024-01-02 08:00:00",
        };
        let annotations = vec![
            Annotation {
                id: "1".to_string(),
                created: String::new(),
                updated: String::new(),
                title: "T".to_string(),
                uri: "https://example.com".to_string(),
                group: "__world__".to_string(),
                note: "page".to_string(),
                tags: vec!["x".to_string()],
                kind: AnnotationKind::PageNote,
            },
            Annotation {
                id: "2".to_string(),
                created: String::new(),
                updated: String::new(),
                title: "T".to_string(),
                uri: "https://example.com".to_string(),
                group: "__world__".to_string(),
                note: "inline".to_string(),
                tags: vec![],
                kind: AnnotationKind::Highlight {
                    quote: "**q**".to_string(),
                    offset: "3".to_string(),
                },
            },
        ];

        let expected = "---\n\
            文章标题: T\n\
            原文链接: <https://example.com>\n\
            分组 ID：[Public](https://hypothes.is/groups/__world__)\n\
            创建时间: 2024-01-01 08:00:00\n\
            更新时间: 2024-01-02 08:00:00\n\
            ---\n\
            \n\
            # 文章笔记\n\
            \n- 笔记：page\n\n  标签：#x\n\
            \n\
            # 高亮标注\n\
            \n- 高亮文本：**q**\n  \n  笔记：inline\n  \n  标签：\n";

        assert_eq!(render_document(&header, &annotations), expected);
    }
}
