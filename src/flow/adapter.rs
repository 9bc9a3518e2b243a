//! Conversion of a [`Document`] into styled [`FlowItem`]s.

use crate::flow::{
    parse_inline, CodeHighlighter, CodeListing, FlowItem, ImageBlock, Inline, Paragraph,
    TableBlock, TocMark,
};
use crate::source::{Chapter, ContentBlock, Document, Section};
use crate::style::resolver::{Alignment, Divider, RuleKind, TextStyle};
use crate::style::{Colour, ResolvedStyle};
use std::path::{Path, PathBuf};

/// The flow items of one chapter, plus what's needed to report on it.
#[derive(Clone, Debug, PartialEq)]
pub struct ChapterFlow {
    /// 1-based position of the chapter in the whole document
    pub number: usize,
    /// The identifier the chapter had in its source
    pub source_id: String,
    pub title: String,
    pub items: Vec<FlowItem>,
}

pub struct ContentAdapter<'a> {
    style: &'a ResolvedStyle,
    highlighter: &'a CodeHighlighter,
    images_dir: PathBuf,
}

impl<'a> ContentAdapter<'a> {
    pub fn new<P: Into<PathBuf>>(
        style: &'a ResolvedStyle,
        highlighter: &'a CodeHighlighter,
        images_dir: P,
    ) -> ContentAdapter<'a> {
        ContentAdapter {
            style,
            highlighter,
            images_dir: images_dir.into(),
        }
    }

    /// Every flow item of the document, in reading order.
    pub fn to_flow_items(&self, document: &Document) -> Vec<FlowItem> {
        self.chapters(document)
            .into_iter()
            .flat_map(|chapter| chapter.items)
            .collect()
    }

    /// The document's flow items grouped by chapter. Chapters are numbered by position,
    /// whatever their source identifiers were.
    pub fn chapters(&self, document: &Document) -> Vec<ChapterFlow> {
        document
            .chapters
            .iter()
            .enumerate()
            .map(|(i, chapter)| self.chapter(i + 1, chapter))
            .collect()
    }

    pub fn chapter(&self, number: usize, chapter: &Chapter) -> ChapterFlow {
        let style = &self.style.chapter;
        let mut items = Vec::new();

        if style.break_before {
            items.push(FlowItem::PageBreak);
        }

        if let Some(number_style) = &style.number {
            let label = number_style
                .case
                .apply(format!("{} {number}", style.number_prefix).trim());
            items.push(FlowItem::Paragraph(Paragraph {
                keep_with_next: true,
                ..Paragraph::new(vec![Inline::plain(label)], number_style.clone())
            }));
        }

        let title = style.title.case.apply(&chapter.title);
        items.push(FlowItem::Paragraph(Paragraph {
            runs: parse_inline(&title),
            style: style.title.clone(),
            toc: self.toc_mark(0, format!("{number}. {}", chapter.title)),
            keep_with_next: true,
        }));
        if let Some(divider) = &style.divider {
            items.push(FlowItem::Rule(divider.clone()));
        }

        for section in &chapter.sections {
            items.extend(self.section(section));
        }

        if style.break_after {
            items.push(FlowItem::PageBreak);
        }

        ChapterFlow {
            number,
            source_id: chapter.id.clone(),
            title: chapter.title.clone(),
            items,
        }
    }

    fn section(&self, section: &Section) -> Vec<FlowItem> {
        let style = &self.style.section;
        let mut items = Vec::new();

        if let Some(title) = section.title.as_deref().filter(|t| !t.trim().is_empty()) {
            let title = match (&section.number, style.numbered) {
                (Some(number), true) => format!("{number}. {title}"),
                _ => title.to_string(),
            };
            items.push(FlowItem::Paragraph(Paragraph {
                runs: parse_inline(&style.title.case.apply(&title)),
                style: style.title.clone(),
                toc: self.toc_mark(1, title),
                keep_with_next: true,
            }));
            if let Some(divider) = &style.divider {
                items.push(FlowItem::Rule(divider.clone()));
            }
        }

        for block in section.content().iter() {
            items.extend(self.block(block));
        }
        items
    }

    fn toc_mark(&self, level: u8, text: String) -> Option<TocMark> {
        (self.style.toc.show && level < self.style.toc.depth).then(|| TocMark {
            level,
            text: strip_markup(&text),
        })
    }

    /// Converts one content block. Blocks never fail here; anything that can go wrong
    /// with them (a missing image, say) is discovered at layout time.
    pub fn block(&self, block: &ContentBlock) -> Vec<FlowItem> {
        match block {
            ContentBlock::Heading { level, text } => {
                let heading_style = self.style.heading(*level);
                vec![FlowItem::Paragraph(Paragraph {
                    runs: parse_inline(text),
                    style: heading_style.clone(),
                    toc: self.toc_mark(level.saturating_add(1), text.clone()),
                    keep_with_next: true,
                })]
            }
            ContentBlock::Paragraph { text } if text.trim().is_empty() => Vec::new(),
            ContentBlock::Paragraph { text } => vec![FlowItem::Paragraph(Paragraph::new(
                parse_inline(text),
                self.style.body.clone(),
            ))],
            ContentBlock::Code { language, text } => {
                vec![FlowItem::Preformatted(CodeListing {
                    lines: self
                        .highlighter
                        .highlight(text, language.as_deref(), &self.style.code),
                    style: self.style.code.clone(),
                })]
            }
            ContentBlock::Table {
                headers,
                rows,
                caption,
            } => {
                let mut group = vec![FlowItem::Table(TableBlock {
                    headers: headers.iter().map(|h| parse_inline(h)).collect(),
                    rows: rows
                        .iter()
                        .map(|row| row.iter().map(|cell| parse_inline(cell)).collect())
                        .collect(),
                    style: self.style.table.clone(),
                })];
                if let Some(caption) = caption {
                    group.push(self.caption(caption));
                }
                vec![FlowItem::KeepTogether(group)]
            }
            ContentBlock::Image { path, caption } => {
                let mut group = vec![FlowItem::Image(ImageBlock {
                    path: self.image_path(path),
                    style: self.style.images.clone(),
                })];
                if let Some(caption) = caption.as_deref().filter(|c| !c.trim().is_empty()) {
                    group.push(self.caption(caption));
                }
                vec![FlowItem::KeepTogether(group)]
            }
            ContentBlock::HorizontalRule => vec![FlowItem::Rule(Divider {
                kind: RuleKind::Solid,
                width: 0.5,
                length: 1.0,
                colour: Colour::new_rgb_bytes(0xA0, 0xA0, 0xA0),
                space_before: 6.0,
                space_after: 12.0,
            })],
            ContentBlock::Equation { text } => {
                // TeX source is shown as-is, so its `*` and `_` are not markup
                let style = TextStyle {
                    italic: true,
                    alignment: Alignment::Center,
                    ..self.style.body.clone()
                };
                vec![FlowItem::Paragraph(Paragraph::new(
                    vec![Inline::plain(text.trim())],
                    style,
                ))]
            }
        }
    }

    fn caption(&self, caption: &str) -> FlowItem {
        FlowItem::Paragraph(Paragraph::new(
            parse_inline(caption),
            self.style.images.caption.clone(),
        ))
    }

    fn image_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.images_dir.join(path)
        }
    }
}

/// TOC lines are drawn in a single style, so emphasis is dropped from them.
fn strip_markup(text: &str) -> String {
    parse_inline(text)
        .into_iter()
        .map(|run| match run {
            Inline::Text { text, .. } => text,
            Inline::LineBreak => " ".to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::parse_document;
    use crate::style::{StyleDescriptor, StyleResolver};

    fn style() -> ResolvedStyle {
        StyleResolver::new("fonts")
            .resolve(&StyleDescriptor::default())
            .expect("defaults resolve")
    }

    fn document() -> Document {
        parse_document(
            r#"{"title": "T", "chapters": [
                {"id": "a", "title": "First", "sections": [
                    {"title": "Opening", "number": "1.1", "blocks": [
                        {"type": "paragraph", "text": "Some <b>bold</b> <blink>text</blink>."},
                        {"type": "heading", "level": 1, "text": "Deep"},
                        {"type": "image", "path": "fig.png", "caption": "A figure"}
                    ]}
                ]},
                {"id": "z", "title": "Second", "sections": [{"text": "plain"}]}
            ]}"#,
            "T",
        )
        .expect("can parse")
    }

    #[test]
    fn tags_chapter_and_section_titles_for_the_toc() {
        let style = style();
        let highlighter = CodeHighlighter::load().expect("can load highlighter");
        let adapter = ContentAdapter::new(&style, &highlighter, "images");
        let items = adapter.to_flow_items(&document());
        let marks: Vec<(u8, String)> = items
            .iter()
            .flat_map(FlowItem::toc_marks)
            .map(|m| (m.level, m.text.clone()))
            .collect();
        // the in-section heading is level 2, deeper than the default TOC depth
        assert_eq!(
            marks,
            vec![
                (0, "1. First".to_string()),
                (1, "1.1. Opening".to_string()),
                (0, "2. Second".to_string()),
            ]
        );
    }

    #[test]
    fn renumbers_chapters_by_position() {
        let style = style();
        let highlighter = CodeHighlighter::load().expect("can load highlighter");
        let adapter = ContentAdapter::new(&style, &highlighter, "images");
        let chapters = adapter.chapters(&document());
        assert_eq!(chapters[1].number, 2);
        assert_eq!(chapters[1].source_id, "z");
        assert_eq!(chapters[0].items[0], FlowItem::PageBreak);
    }

    #[test]
    fn groups_images_with_their_captions() {
        let style = style();
        let highlighter = CodeHighlighter::load().expect("can load highlighter");
        let adapter = ContentAdapter::new(&style, &highlighter, "images");
        let items = adapter.block(&ContentBlock::Image {
            path: "fig.png".to_string(),
            caption: Some("A figure".to_string()),
        });
        let [FlowItem::KeepTogether(group)] = items.as_slice() else {
            panic!("expected a keep-together group, got {items:?}");
        };
        assert!(
            matches!(&group[0], FlowItem::Image(image) if image.path == Path::new("images/fig.png"))
        );
        assert!(matches!(&group[1], FlowItem::Paragraph(p) if p.plain_text() == "A figure"));
    }

    #[test]
    fn keeps_unknown_markup_visible() {
        let style = style();
        let highlighter = CodeHighlighter::load().expect("can load highlighter");
        let adapter = ContentAdapter::new(&style, &highlighter, "images");
        let items = adapter.block(&ContentBlock::Paragraph {
            text: "Some <b>bold</b> <blink>text</blink>.".to_string(),
        });
        let [FlowItem::Paragraph(p)] = items.as_slice() else {
            panic!("expected a paragraph");
        };
        assert_eq!(p.plain_text(), "Some bold <blink>text</blink>.");
    }

    #[test]
    fn equations_are_literal() {
        let style = style();
        let highlighter = CodeHighlighter::load().expect("can load highlighter");
        let adapter = ContentAdapter::new(&style, &highlighter, "images");
        let items = adapter.block(&ContentBlock::Equation {
            text: "a_1 * b_2".to_string(),
        });
        let [FlowItem::Paragraph(p)] = items.as_slice() else {
            panic!("expected a paragraph");
        };
        assert_eq!(p.plain_text(), "a_1 * b_2");
        assert!(p.style.italic);
    }
}
