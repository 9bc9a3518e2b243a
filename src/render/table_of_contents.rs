//! Table of contents: pages are reserved before the content is composed and filled
//! in once every heading has landed on a page.

use crate::flow::Inline;
use crate::render::composer::{baseline_offset, draw_line, TocEntry};
use crate::render::layout::{break_lines, pieces, Line};
use crate::render::page::{DrawOp, PageState};
use crate::render::page_numbers::format_page_number;
use crate::style::fonts::FontRegistry;
use crate::style::{ResolvedStyle, TextStyle};

const ELLIPSIS: &str = "\u{2026}";

/// Pages set aside for the table of contents.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TocReservation {
    /// 0-based index of the first reserved page
    pub first_page: usize,
    pub pages: usize,
}

fn title_lines(style: &ResolvedStyle, fonts: &FontRegistry) -> Vec<Line> {
    let toc = &style.toc;
    break_lines(
        &pieces(&[Inline::plain(toc.title_text.clone())], &toc.title, fonts),
        fonts,
        style.frame().width,
    )
}

fn title_height(style: &ResolvedStyle, fonts: &FontRegistry) -> f32 {
    let title = &style.toc.title;
    title_lines(style, fonts).len() as f32 * title.leading + title.space_after
}

/// Every entry gets the same row height so the reservation can be sized up front.
fn row_height(style: &ResolvedStyle) -> f32 {
    style
        .toc
        .levels
        .iter()
        .map(|l| l.leading)
        .fold(style.body.leading, f32::max)
}

/// Entries that fit on the first and on each following TOC page.
fn capacity(style: &ResolvedStyle, fonts: &FontRegistry) -> (usize, usize) {
    let frame = style.frame();
    let row = row_height(style);
    let first = ((frame.height - title_height(style, fonts)) / row).floor().max(1.0) as usize;
    let rest = (frame.height / row).floor().max(1.0) as usize;
    (first, rest)
}

/// Pages needed to list `entries` headings.
pub fn pages_needed(style: &ResolvedStyle, fonts: &FontRegistry, entries: usize) -> usize {
    let (first, rest) = capacity(style, fonts);
    if entries <= first {
        1
    } else {
        1 + (entries - first).div_ceil(rest)
    }
}

/// Shortens `text` with an ellipsis until it fits in `width`.
fn truncate(text: &str, fonts: &FontRegistry, style: &TextStyle, width: f32) -> String {
    let font = style.face(fonts, false, false);
    if fonts.text_width(font, text, style.size) <= width {
        return text.to_string();
    }
    let mut chars: Vec<char> = text.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let candidate = format!("{}{ELLIPSIS}", chars.iter().collect::<String>().trim_end());
        if fonts.text_width(font, &candidate, style.size) <= width {
            return candidate;
        }
    }
    String::new()
}

fn draw_entry(
    page: &mut PageState,
    entry: &TocEntry,
    top: f32,
    style: &ResolvedStyle,
    fonts: &FontRegistry,
) {
    let frame = style.frame();
    let toc = &style.toc;
    let text = toc.level(entry.level);
    let font = text.face(fonts, false, false);
    let baseline = top - baseline_offset(text);

    let number = format_page_number(entry.page, style.page_numbers.numerals);
    let number_width = fonts.text_width(font, &number, text.size);
    let left = frame.left + text.indent;
    let available = frame.right() - left - number_width - text.size;
    let label = truncate(&entry.text, fonts, text, available.max(0.0));
    let label_width = fonts.text_width(font, &label, text.size);

    let text_op = |x: f32, content: String| DrawOp::Text {
        x,
        y: baseline,
        font,
        size: text.size,
        colour: text.colour,
        text: content,
        word_spacing: 0.0,
    };
    page.ops.push(text_op(left, label));

    if toc.dot_leader {
        let dot = fonts.text_width(font, ".", text.size).max(0.1);
        let start = left + label_width + dot;
        let end = frame.right() - number_width - dot;
        let count = ((end - start) / dot).floor();
        if count >= 2.0 {
            page.ops.push(text_op(end - count * dot, ".".repeat(count as usize)));
        }
    }
    page.ops.push(text_op(frame.right() - number_width, number));

    page.ops.push(DrawOp::Link {
        rect: [frame.left, top - row_height(style), frame.right(), top],
        target: entry.page - 1,
    });
}

/// Draws the TOC into the reserved pages. Entries that do not fit are dropped with a
/// warning rather than pushing the content.
pub fn populate(
    pages: &mut [PageState],
    reservation: TocReservation,
    entries: &[TocEntry],
    style: &ResolvedStyle,
    fonts: &FontRegistry,
) {
    let frame = style.frame();
    let row = row_height(style);
    let last = reservation.first_page + reservation.pages;
    if reservation.pages == 0 || pages.len() < last {
        log::warn!("Table of contents pages are missing, skipping it");
        return;
    }

    let mut index = reservation.first_page;
    let mut top = frame.top();
    let title = &style.toc.title;
    for line in title_lines(style, fonts) {
        draw_line(
            &mut pages[index],
            &line,
            title,
            title.alignment,
            frame.left,
            frame.width,
            top,
        );
        top -= title.leading;
    }
    top -= title.space_after;

    let (mut room, rest) = capacity(style, fonts);
    for (i, entry) in entries.iter().enumerate() {
        if room == 0 {
            index += 1;
            top = frame.top();
            room = rest;
            if index >= last {
                log::warn!(
                    "Table of contents ran out of room, {} entries left out",
                    entries.len() - i
                );
                return;
            }
        }
        if entry.page == 0 || entry.page > pages.len() {
            log::warn!("Heading `{}` points outside the document, skipping", entry.text);
            continue;
        }
        draw_entry(&mut pages[index], entry, top, style, fonts);
        top -= row;
        room -= 1;
    }
    log::debug!("Wrote {} table of contents entries", entries.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{StyleDescriptor, StyleResolver};

    fn resolve(json: &str) -> (StyleResolver, ResolvedStyle) {
        let mut resolver = StyleResolver::new("fonts");
        let descriptor: StyleDescriptor = serde_json::from_str(json).expect("valid descriptor");
        let style = resolver.resolve(&descriptor).expect("style resolves");
        (resolver, style)
    }

    fn entries(count: usize) -> Vec<TocEntry> {
        (0..count)
            .map(|i| TocEntry {
                level: (i % 2) as u8,
                text: format!("Heading {i}"),
                page: 3 + i,
            })
            .collect()
    }

    #[test]
    fn can_size_the_reservation() {
        let (resolver, style) = resolve("{}");
        let (first, rest) = capacity(&style, resolver.fonts());
        assert!(first < rest);
        assert_eq!(pages_needed(&style, resolver.fonts(), 0), 1);
        assert_eq!(pages_needed(&style, resolver.fonts(), first), 1);
        assert_eq!(pages_needed(&style, resolver.fonts(), first + 1), 2);
        assert_eq!(pages_needed(&style, resolver.fonts(), first + rest + 1), 3);
    }

    #[test]
    fn entries_fill_exactly_the_reserved_pages() {
        let (resolver, style) = resolve("{}");
        let (first, rest) = capacity(&style, resolver.fonts());
        let entries = entries(first + rest);
        let needed = pages_needed(&style, resolver.fonts(), entries.len());
        let mut pages: Vec<PageState> = (0..needed + 1 + entries.len() + 3)
            .map(|i| PageState::new(i, style.geometry))
            .collect();
        let reservation = TocReservation {
            first_page: 1,
            pages: needed,
        };
        populate(&mut pages, reservation, &entries, &style, resolver.fonts());

        assert!(pages[0].is_blank());
        assert!(pages[1].text().starts_with(&style.toc.title_text));
        assert!(pages[2].text().contains(&format!("Heading {}", entries.len() - 1)));
        let links: usize = pages
            .iter()
            .flat_map(|p| &p.ops)
            .filter(|op| matches!(op, DrawOp::Link { .. }))
            .count();
        assert_eq!(links, entries.len());
    }

    #[test]
    fn long_titles_are_truncated() {
        let (resolver, style) = resolve("{}");
        let text = &style.toc.levels[0];
        let long = "word ".repeat(100);
        let short = truncate(&long, resolver.fonts(), text, 100.0);
        assert!(short.ends_with(ELLIPSIS));
        let font = text.face(resolver.fonts(), false, false);
        assert!(resolver.fonts().text_width(font, &short, text.size) <= 100.0);
    }
}
