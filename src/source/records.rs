use crate::source::document::{optional_string_or_number, string_or_number};
use crate::source::{Chapter, Document, Section};
use serde::Deserialize;
use std::cmp::Ordering;

/// One row of the flat input format: a section tagged with the chapter it belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub chapter_id: String,
    pub chapter_name: String,
    #[serde(default)]
    pub section_name: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub section_number: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// Numeric segments sort before text ones and compare as numbers.
fn compare_segment(x: &str, y: &str) -> Ordering {
    match (x.trim().parse::<u64>(), y.trim().parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => x.trim().cmp(y.trim()),
    }
}

/// Compares dotted numberings like `2.10` and `2.9` segment by segment.
pub fn compare_numbering(a: &str, b: &str) -> Ordering {
    let mut a_parts = a.split('.');
    let mut b_parts = b.split('.');
    loop {
        match (a_parts.next(), b_parts.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = compare_segment(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// Groups flat records into chapters ordered by chapter id, with each chapter's
/// sections ordered by section number. Sections without a number come first, in
/// their original order.
pub fn group_records(title: &str, records: Vec<SectionRecord>) -> Document {
    let mut chapters: Vec<Chapter> = Vec::new();
    for record in records {
        let section = Section {
            title: record.section_name,
            number: record.section_number,
            text: Some(record.text),
            blocks: Vec::new(),
        };
        match chapters.iter_mut().find(|c| c.id == record.chapter_id) {
            Some(chapter) => chapter.sections.push(section),
            None => chapters.push(Chapter {
                id: record.chapter_id,
                title: record.chapter_name,
                sections: vec![section],
            }),
        }
    }

    chapters.sort_by(|a, b| compare_numbering(&a.id, &b.id));
    for chapter in chapters.iter_mut() {
        chapter.sections.sort_by(|a, b| match (&a.number, &b.number) {
            (Some(a), Some(b)) => compare_numbering(a, b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }
    log::debug!("Grouped records into {} chapters", chapters.len());

    Document {
        title: title.to_string(),
        author: None,
        chapters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(chapter: &str, section: &str, text: &str) -> SectionRecord {
        SectionRecord {
            chapter_id: chapter.to_string(),
            chapter_name: format!("Chapter {chapter}"),
            section_name: Some(format!("Section {section}")),
            section_number: Some(section.to_string()),
            text: text.to_string(),
        }
    }

    #[test]
    fn can_compare_numberings() {
        assert_eq!(compare_numbering("2", "10"), Ordering::Less);
        assert_eq!(compare_numbering("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_numbering("1", "1.1"), Ordering::Less);
        assert_eq!(compare_numbering("b", "a"), Ordering::Greater);
        // numbers before text in every segment, so the order is transitive
        assert_eq!(compare_numbering("10", "1a"), Ordering::Less);
        assert_eq!(compare_numbering("2", "1a"), Ordering::Less);
        assert_eq!(compare_numbering("2", "10"), Ordering::Less);
    }

    #[test]
    fn sorts_mixed_numbered_and_unnumbered_sections() {
        let records: Vec<SectionRecord> = (1..=200)
            .rev()
            .map(|n| {
                let mut r = record("1", &format!("1.{n}"), &n.to_string());
                if n % 3 == 0 {
                    r.section_number = None;
                }
                r
            })
            .collect();
        let doc = group_records("Book", records);
        let sections = &doc.chapters[0].sections;
        assert_eq!(sections.len(), 200);

        let unnumbered = sections.iter().take_while(|s| s.number.is_none()).count();
        assert_eq!(unnumbered, 66);
        // unnumbered sections keep their input order
        let texts: Vec<&str> = sections[..unnumbered]
            .iter()
            .filter_map(|s| s.text.as_deref())
            .collect();
        assert_eq!(texts.first(), Some(&"198"));
        assert_eq!(texts.last(), Some(&"3"));

        let numbers: Vec<&str> = sections[unnumbered..]
            .iter()
            .map(|s| s.number.as_deref().expect("numbered"))
            .collect();
        assert!(numbers
            .windows(2)
            .all(|w| compare_numbering(w[0], w[1]) == Ordering::Less));
        assert_eq!(numbers.first(), Some(&"1.1"));
        assert_eq!(numbers.last(), Some(&"1.200"));
    }

    #[test]
    fn can_group_records_in_order() {
        let doc = group_records(
            "Book",
            vec![
                record("10", "10.1", "j"),
                record("2", "2.2", "b2"),
                record("2", "2.1", "b1"),
                record("1", "1.1", "a"),
            ],
        );
        let ids: Vec<&str> = doc.chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "10"]);
        let texts: Vec<Option<&str>> = doc.chapters[1]
            .sections
            .iter()
            .map(|s| s.text.as_deref())
            .collect();
        assert_eq!(texts, vec![Some("b1"), Some("b2")]);
    }
}
