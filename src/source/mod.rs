mod content_block;
pub use content_block::*;

mod document;
pub use document::*;

mod records;
pub use records::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Loads a document from either the nested document format or a flat list of
/// section records, deciding by whether the top-level JSON value is an array.
pub fn load_document(path: &Path) -> Result<Document> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {}", path.display()))?;
    let fallback_title = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string());
    parse_document(&contents, &fallback_title)
        .with_context(|| format!("Failed to parse document {}", path.display()))
}

pub fn parse_document(contents: &str, fallback_title: &str) -> Result<Document> {
    if contents.trim_start().starts_with('[') {
        let records: Vec<SectionRecord> = serde_json::from_str(contents)?;
        Ok(group_records(fallback_title, records))
    } else {
        Ok(serde_json::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_parse_nested_documents() {
        let doc = parse_document(
            r#"{
                "title": "A Book",
                "author": "Someone",
                "chapters": [
                    {"id": 7, "title": "Start", "sections": [
                        {"title": "Intro", "text": "Hello there."},
                        {"blocks": [{"type": "heading", "level": 2, "text": "Aside"}, {"type": "hr"}]}
                    ]}
                ]
            }"#,
            "fallback",
        )
        .expect("can parse");
        assert_eq!(doc.title, "A Book");
        assert_eq!(doc.chapters[0].id, "7");
        assert_eq!(doc.chapters[0].sections.len(), 2);
        assert_eq!(
            doc.chapters[0].sections[1].blocks[1],
            ContentBlock::HorizontalRule
        );
    }

    #[test]
    fn can_parse_flat_records() {
        let doc = parse_document(
            r#"[{"chapter_id": "1", "chapter_name": "One", "section_name": "A", "section_number": "1.1", "text": "x"}]"#,
            "Records",
        )
        .expect("can parse");
        assert_eq!(doc.title, "Records");
        assert_eq!(doc.chapters[0].title, "One");
    }

    #[test]
    fn reports_where_documents_are_broken() {
        let err = parse_document("{\n\"title\": 5\n}", "x").expect_err("title must be a string");
        assert!(format!("{err:#}").contains("line 2"));
    }
}
