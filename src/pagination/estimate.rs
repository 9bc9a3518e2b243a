//! Page-count estimates from character counts.
//!
//! The estimate is a heuristic: it derives a characters-per-page figure from the frame
//! size, the body font size and leading, and an average glyph width, then divides the
//! text volume by it. It does not lay anything out, so it can be off for code listings
//! and tables, but it only grows as content grows, which is all partitioning needs.

use crate::flow::{FlowItem, Inline};
use crate::style::ResolvedStyle;

/// Average glyph advance as a fraction of the font size, for proportional text.
pub const AVERAGE_GLYPH_EM: f32 = 0.5;
/// Pages added per image, on top of any caption text.
pub const PAGES_PER_IMAGE: f32 = 0.5;
/// Pages added when chapters are forced onto their own pages.
pub const PAGE_BREAK_OVERHEAD: f32 = 1.0;

/// How many characters of body text fit on one page of `style`.
pub fn chars_per_page(style: &ResolvedStyle) -> f32 {
    let frame = style.frame();
    let glyph_width = style.body.size * AVERAGE_GLYPH_EM;
    let chars_per_line = (frame.width / glyph_width).floor().max(1.0);
    let lines_per_page = (frame.height / style.body.leading).floor().max(1.0);
    chars_per_line * lines_per_page
}

fn inline_chars(runs: &[Inline]) -> usize {
    runs.iter()
        .map(|run| match run {
            Inline::Text { text, .. } => text.chars().count(),
            Inline::LineBreak => 1,
        })
        .sum()
}

/// Characters and images in a flow item, recursing into keep-together groups.
fn volume(item: &FlowItem) -> (usize, usize) {
    match item {
        FlowItem::Paragraph(p) => (inline_chars(&p.runs), 0),
        FlowItem::Preformatted(code) => {
            let chars = code
                .lines
                .iter()
                .map(|line| line.iter().map(|s| s.text.chars().count()).sum::<usize>() + 1)
                .sum();
            (chars, 0)
        }
        FlowItem::Table(table) => {
            let chars = table
                .headers
                .iter()
                .chain(table.rows.iter().flatten())
                .map(|cell| inline_chars(cell) + 1)
                .sum();
            (chars, 0)
        }
        FlowItem::Image(_) => (0, 1),
        FlowItem::KeepTogether(items) => items
            .iter()
            .map(volume)
            .fold((0, 0), |(c, i), (dc, di)| (c + dc, i + di)),
        FlowItem::Rule(_) | FlowItem::PageBreak => (0, 0),
    }
}

/// Estimates how many pages `items` will occupy. Always at least 1.
pub fn estimate(items: &[FlowItem], style: &ResolvedStyle) -> u32 {
    let (chars, images) = items
        .iter()
        .map(volume)
        .fold((0, 0), |(c, i), (dc, di)| (c + dc, i + di));

    let mut pages = chars as f32 / chars_per_page(style);
    if style.chapter.break_before || style.chapter.break_after {
        pages += PAGE_BREAK_OVERHEAD;
    }
    pages += images as f32 * PAGES_PER_IMAGE;

    (pages.ceil() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{ImageBlock, Paragraph};
    use crate::style::{PageSize, StyleDescriptor, StyleResolver};
    use proptest::prelude::*;

    fn style(json: &str) -> ResolvedStyle {
        let descriptor: StyleDescriptor = serde_json::from_str(json).expect("valid descriptor");
        StyleResolver::new("fonts")
            .resolve(&descriptor)
            .expect("style resolves")
    }

    fn paragraph(style: &ResolvedStyle, chars: usize) -> FlowItem {
        FlowItem::Paragraph(Paragraph::new(
            vec![Inline::plain("x".repeat(chars))],
            style.body.clone(),
        ))
    }

    #[test]
    fn empty_chapters_take_a_page() {
        let style = style(r#"{"chapter": {"page_break": {"before": false}}}"#);
        assert_eq!(estimate(&[], &style), 1);
    }

    #[test]
    fn forced_breaks_add_a_page() {
        let breaking = style("{}");
        let flowing = style(r#"{"chapter": {"page_break": {"before": false}}}"#);
        let per_page = chars_per_page(&flowing) as usize;
        let items = vec![paragraph(&flowing, per_page * 2)];
        assert_eq!(estimate(&items, &flowing), 2);
        assert_eq!(estimate(&items, &breaking), 3);
    }

    #[test]
    fn images_add_half_a_page() {
        let style = style(r#"{"chapter": {"page_break": {"before": false}}}"#);
        let image = FlowItem::KeepTogether(vec![FlowItem::Image(ImageBlock {
            path: "a.png".into(),
            style: style.images.clone(),
        })]);
        assert_eq!(estimate(&[image.clone()], &style), 1);
        assert_eq!(estimate(&[image.clone(), image.clone(), image], &style), 2);
    }

    #[test]
    fn smaller_pages_need_more_pages() {
        let a4 = style("{}");
        let trade = StyleResolver::scale_for(&a4, PageSize::UsTrade);
        let items = vec![paragraph(&a4, 20_000)];
        assert!(estimate(&items, &trade) > estimate(&items, &a4));
    }

    proptest! {
        #[test]
        fn estimates_are_monotonic(a in 0usize..50_000, b in 0usize..50_000) {
            let style = style("{}");
            let (small, large) = (a.min(b), a.max(b));
            let small = estimate(&[paragraph(&style, small)], &style);
            let large = estimate(&[paragraph(&style, large)], &style);
            prop_assert!(small >= 1);
            prop_assert!(small <= large);
        }
    }
}
