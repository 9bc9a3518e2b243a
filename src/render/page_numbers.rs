//! Page numbering, drawn once the total page count is known.
//!
//! Number templates support two placeholders:
//! - `{current}` - this page's number (formatted per the numeral style)
//! - `{total}` - the number of pages in the document
//!
//! Outer and Inner positions alternate with page parity, for bound output.

use crate::render::page::{DrawOp, PageState};
use crate::style::fonts::FontRegistry;
use crate::style::resolver::{HorizontalPosition, Numerals, VerticalPosition};
use crate::style::{Margins, ResolvedStyle};
use anyhow::{anyhow, Result};

/// Convert a number to lowercase Roman numerals.
fn to_roman(mut n: usize) -> String {
    if n == 0 {
        return n.to_string();
    }

    let numerals = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];

    let mut result = String::new();
    for (value, numeral) in numerals {
        while n >= value {
            result.push_str(numeral);
            n -= value;
        }
    }
    result
}

pub fn format_page_number(n: usize, numerals: Numerals) -> String {
    match numerals {
        Numerals::Arabic => n.to_string(),
        Numerals::RomanLower => to_roman(n),
        Numerals::RomanUpper => to_roman(n).to_uppercase(),
    }
}

/// Fills in a number template for one page.
pub fn format_page_label(
    template: &str,
    current: usize,
    total: usize,
    numerals: Numerals,
) -> String {
    template
        .replace("{current}", &format_page_number(current, numerals))
        .replace("{total}", &format_page_number(total, numerals))
}

/// X coordinate for a label of `text_width` on the page at `page_index`.
fn calculate_x_position(
    position: HorizontalPosition,
    page_index: usize,
    left: f32,
    right: f32,
    text_width: f32,
) -> f32 {
    // even indices are right-hand (recto) pages in a bound book
    let is_recto = page_index % 2 == 0;

    match position {
        HorizontalPosition::Outer => {
            if is_recto {
                right - text_width
            } else {
                left
            }
        }
        HorizontalPosition::Inner => {
            if is_recto {
                left
            } else {
                right - text_width
            }
        }
        HorizontalPosition::Center => left + (right - left - text_width) / 2.0,
        HorizontalPosition::Left => left,
        HorizontalPosition::Right => right - text_width,
    }
}

fn stamp(
    page: &mut PageState,
    label: String,
    style: &ResolvedStyle,
    fonts: &FontRegistry,
) -> Result<()> {
    let numbers = &style.page_numbers;
    let text = &numbers.text;
    let font = text.face(fonts, false, false);
    if fonts.face(font).is_none() {
        return Err(anyhow!("no face for font `{}`", text.font));
    }

    let width = fonts.text_width(font, &label, text.size);
    if width > page.geometry.width {
        return Err(anyhow!(
            "label `{label}` is {width:.0}pt wide, wider than the page"
        ));
    }

    let Margins {
        top,
        right,
        bottom,
        left,
    } = style.margins;
    let x = calculate_x_position(
        numbers.position.horizontal,
        page.index,
        left,
        page.geometry.width - right,
        width,
    )
    .clamp(0.0, page.geometry.width - width);

    // centred in the margin, nudged so the digits sit optically in the middle
    let y = match numbers.position.vertical {
        VerticalPosition::Bottom => (bottom / 2.0 - text.size * 0.3).max(2.0),
        VerticalPosition::Top => {
            page.geometry.height - (top / 2.0 + text.size * 0.3).max(text.size)
        }
    };

    page.ops.push(DrawOp::Text {
        x,
        y,
        font,
        size: text.size,
        colour: text.colour,
        text: label,
        word_spacing: 0.0,
    });
    Ok(())
}

/// Draws page numbers on every page from the style's start page on. A page whose
/// label cannot be drawn is left unnumbered; their indices are returned.
pub fn number_pages(
    pages: &mut [PageState],
    style: &ResolvedStyle,
    fonts: &FontRegistry,
) -> Vec<usize> {
    let numbers = &style.page_numbers;
    if !numbers.show {
        return Vec::new();
    }

    let total = pages.len();
    let mut unnumbered = Vec::new();
    for page in pages.iter_mut().skip(numbers.start_page.saturating_sub(1)) {
        let label = format_page_label(&numbers.format, page.index + 1, total, numbers.numerals);
        if label.trim().is_empty() {
            continue;
        }
        if let Err(e) = stamp(page, label, style, fonts) {
            if unnumbered.is_empty() {
                log::warn!("Page {} left without a number: {e:#}", page.index + 1);
            } else {
                log::debug!("Page {} left without a number: {e:#}", page.index + 1);
            }
            unnumbered.push(page.index);
        }
    }
    if unnumbered.len() > 1 {
        log::warn!("{} pages in total have no page number", unnumbered.len());
    }
    unnumbered
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

    fn pages(style: &ResolvedStyle, count: usize) -> Vec<PageState> {
        (0..count).map(|i| PageState::new(i, style.geometry)).collect()
    }

    #[test]
    fn can_convert_to_roman() {
        assert_eq!(to_roman(1), "i");
        assert_eq!(to_roman(4), "iv");
        assert_eq!(to_roman(14), "xiv");
        assert_eq!(to_roman(1994), "mcmxciv");
        assert_eq!(format_page_number(9, Numerals::RomanUpper), "IX");
        assert_eq!(format_page_number(9, Numerals::Arabic), "9");
    }

    #[test]
    fn can_fill_templates() {
        assert_eq!(format_page_label("{current} of {total}", 3, 5, Numerals::Arabic), "3 of 5");
        assert_eq!(format_page_label("Page {current}", 3, 5, Numerals::RomanLower), "Page iii");
    }

    #[test]
    fn numbers_start_at_the_start_page() {
        let (resolver, style) = resolve(
            r#"{"page_numbers": {"format": "{current} of {total}", "start_page": 2}}"#,
        );
        let mut pages = pages(&style, 5);
        let unnumbered = number_pages(&mut pages, &style, resolver.fonts());
        assert!(unnumbered.is_empty());
        assert!(pages[0].is_blank());
        for (i, page) in pages.iter().enumerate().skip(1) {
            assert_eq!(page.text(), format!("{} of 5", i + 1));
        }
    }

    #[test]
    fn hidden_numbers_draw_nothing() {
        let (resolver, style) = resolve(r#"{"page_numbers": {"show": false}}"#);
        let mut pages = pages(&style, 3);
        number_pages(&mut pages, &style, resolver.fonts());
        assert!(pages.iter().all(PageState::is_blank));
    }

    #[test]
    fn oversized_labels_leave_pages_unnumbered() {
        let long = "x".repeat(400);
        let (resolver, style) = resolve(&format!(
            r#"{{"page_numbers": {{"format": "{long} {{current}}", "start_page": 1}}}}"#
        ));
        let mut pages = pages(&style, 2);
        let unnumbered = number_pages(&mut pages, &style, resolver.fonts());
        assert_eq!(unnumbered, vec![0, 1]);
        assert!(pages.iter().all(PageState::is_blank));
    }

    #[test]
    fn outer_numbers_alternate_sides() {
        let (resolver, style) = resolve(
            r#"{"page_numbers": {"position": "bottom-outer", "start_page": 1}}"#,
        );
        let mut pages = pages(&style, 2);
        number_pages(&mut pages, &style, resolver.fonts());
        let x = |page: &PageState| match &page.ops[0] {
            DrawOp::Text { x, .. } => *x,
            other => panic!("expected text, got {other:?}"),
        };
        assert!(x(&pages[0]) > style.geometry.width / 2.0);
        assert_eq!(x(&pages[1]), style.margins.left);
    }
}
