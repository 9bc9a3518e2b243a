//! Layout primitives ("flow items") and the conversion from documents into them.

mod adapter;
pub use adapter::*;

mod highlight;
pub use highlight::*;

mod inline;
pub use inline::*;

use crate::style::resolver::{CodeStyle, Divider, ImageStyle, TableStyle, TextStyle};
use crate::style::Colour;
use std::path::PathBuf;

/// A run of inline content inside a paragraph or table cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Inline {
    Text {
        text: String,
        bold: bool,
        italic: bool,
    },
    LineBreak,
}

impl Inline {
    pub fn plain<S: Into<String>>(text: S) -> Inline {
        Inline::Text {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }
}

/// Marks a paragraph as a heading that gets an entry in the table of contents.
#[derive(Clone, Debug, PartialEq)]
pub struct TocMark {
    /// 0 for chapter titles, 1 for section titles, deeper for in-section headings
    pub level: u8,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<Inline>,
    pub style: TextStyle,
    pub toc: Option<TocMark>,
    /// Don't leave this paragraph stranded at the bottom of a page
    pub keep_with_next: bool,
}

impl Paragraph {
    pub fn new(runs: Vec<Inline>, style: TextStyle) -> Paragraph {
        Paragraph {
            runs,
            style,
            toc: None,
            keep_with_next: false,
        }
    }

    /// The paragraph's text without markup, line breaks as spaces.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        for run in &self.runs {
            match run {
                Inline::Text { text: t, .. } => text.push_str(t),
                Inline::LineBreak => text.push(' '),
            }
        }
        text
    }
}

/// A coloured span of highlighted source code.
#[derive(Clone, Debug, PartialEq)]
pub struct CodeSpan {
    pub text: String,
    pub colour: Colour,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CodeListing {
    pub lines: Vec<Vec<CodeSpan>>,
    pub style: CodeStyle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableBlock {
    pub headers: Vec<Vec<Inline>>,
    pub rows: Vec<Vec<Vec<Inline>>>,
    pub style: TableStyle,
}

impl TableBlock {
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageBlock {
    pub path: PathBuf,
    pub style: ImageStyle,
}

/// The atomic unit the renderer lays out.
#[derive(Clone, Debug, PartialEq)]
pub enum FlowItem {
    Paragraph(Paragraph),
    Preformatted(CodeListing),
    Table(TableBlock),
    Image(ImageBlock),
    Rule(Divider),
    PageBreak,
    /// Items that move to a new page together rather than being split
    KeepTogether(Vec<FlowItem>),
}

impl FlowItem {
    /// The TOC marks carried by this item, in order.
    pub fn toc_marks(&self) -> Vec<&TocMark> {
        match self {
            FlowItem::Paragraph(p) => p.toc.iter().collect(),
            FlowItem::KeepTogether(items) => items.iter().flat_map(FlowItem::toc_marks).collect(),
            _ => Vec::new(),
        }
    }
}
