//! Captured page state: a display list per page, kept open until finalization.

use crate::render::images::ImageId;
use crate::style::fonts::FontId;
use crate::style::resolver::RuleKind;
use crate::style::{Colour, PageGeometry};

/// One drawing operation, in PDF coordinates (origin bottom-left, points).
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        font: FontId,
        size: f32,
        colour: Colour,
        text: String,
        /// Extra space added to every space character, for justified lines
        word_spacing: f32,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        width: f32,
        colour: Colour,
        kind: RuleKind,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Colour,
    },
    Image {
        image: ImageId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    /// A clickable area that jumps to another page of the same document
    Link {
        rect: [f32; 4],
        /// 0-based page index
        target: usize,
    },
}

/// Everything recorded about one page during composition. Pages stay editable until
/// the document is sealed, which is what lets numbering and the TOC be drawn last.
#[derive(Clone, Debug, PartialEq)]
pub struct PageState {
    /// 0-based position in the output document
    pub index: usize,
    pub geometry: PageGeometry,
    pub ops: Vec<DrawOp>,
}

impl PageState {
    pub fn new(index: usize, geometry: PageGeometry) -> PageState {
        PageState {
            index,
            geometry,
            ops: Vec::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.ops.is_empty()
    }

    /// All text drawn on the page, in drawing order.
    pub fn text(&self) -> String {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<&str>>()
            .join(" ")
    }
}
