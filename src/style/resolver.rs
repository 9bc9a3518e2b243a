//! Turns a [`StyleDescriptor`] into a fully concrete [`ResolvedStyle`].
//!
//! Resolution fills every missing value with a default, registers the descriptor's
//! fonts, and validates geometry. [`StyleResolver::scale_for`] then derives styles for
//! other page sizes without touching the font registry.

use crate::style::colour::{self, Colour};
use crate::style::descriptor::{DividerDescriptor, StyleDescriptor, TextDescriptor};
use crate::style::fonts::{FontFiles, FontId, FontRegistry};
use crate::style::page_size::{Margins, PageGeometry, PageSize};
use anyhow::{anyhow, Result};
use std::path::PathBuf;

/// Margins never shrink below this when scaling to a smaller page.
pub const MIN_MARGIN: f32 = 18.0;
/// Fonts are only scaled when the target page has less than this fraction of the area.
pub const FONT_SCALE_AREA_RATIO: f32 = 0.7;
/// Fonts are never scaled by less than this factor.
pub const MIN_FONT_FACTOR: f32 = 0.8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justified,
}

impl Alignment {
    fn parse_or(text: Option<&str>, fallback: Alignment) -> Alignment {
        match text.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            None => fallback,
            Some("left") => Alignment::Left,
            Some("center") | Some("centre") | Some("centered") | Some("centred") => {
                Alignment::Center
            }
            Some("right") => Alignment::Right,
            Some("justify") | Some("justified") => Alignment::Justified,
            Some(other) => {
                log::warn!("Unknown alignment `{other}`, using {fallback:?}");
                fallback
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextCase {
    AsIs,
    Upper,
    Lower,
    Title,
}

impl TextCase {
    fn parse_or(text: Option<&str>, fallback: TextCase) -> TextCase {
        match text.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            None => fallback,
            Some("upper") | Some("uppercase") => TextCase::Upper,
            Some("lower") | Some("lowercase") => TextCase::Lower,
            Some("title") | Some("titlecase") => TextCase::Title,
            Some("none") | Some("") => TextCase::AsIs,
            Some(other) => {
                log::warn!("Unknown text case `{other}`, leaving text as-is");
                TextCase::AsIs
            }
        }
    }

    pub fn apply(&self, text: &str) -> String {
        match self {
            TextCase::AsIs => text.to_string(),
            TextCase::Upper => text.to_uppercase(),
            TextCase::Lower => text.to_lowercase(),
            TextCase::Title => text
                .split(' ')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<String>>()
                .join(" "),
        }
    }
}

/// Which minimum size applies to a text style when it is scaled down.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextClass {
    Heading,
    Body,
    Caption,
}

impl TextClass {
    pub fn min_size(&self) -> f32 {
        match self {
            TextClass::Heading => 10.0,
            TextClass::Body => 7.0,
            TextClass::Caption => 6.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextStyle {
    /// Logical font name, resolved through the [`FontRegistry`] at layout time
    pub font: String,
    pub bold: bool,
    pub italic: bool,
    pub size: f32,
    pub leading: f32,
    pub colour: Colour,
    pub alignment: Alignment,
    pub space_before: f32,
    pub space_after: f32,
    pub indent: f32,
    pub case: TextCase,
    pub class: TextClass,
}

impl TextStyle {
    /// The physical face for a run in this style, with extra emphasis from inline markup.
    pub fn face(&self, fonts: &FontRegistry, bold: bool, italic: bool) -> FontId {
        fonts.resolve(&self.font, self.bold || bold, self.italic || italic)
    }

    fn scale(&mut self, factor: f32) {
        let floor = self.class.min_size().min(self.size);
        let size = (self.size * factor).max(floor);
        let ratio = size / self.size;
        self.leading *= ratio;
        self.size = size;
        self.space_before = scale_spacing(self.space_before, factor);
        self.space_after = scale_spacing(self.space_after, factor);
        self.indent *= factor;
    }
}

fn scale_spacing(value: f32, factor: f32) -> f32 {
    (value * factor).max(2.0f32.min(value))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RuleKind {
    Solid,
    Dotted,
    Dashed,
}

/// A horizontal rule drawn between blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct Divider {
    pub kind: RuleKind,
    pub width: f32,
    /// Fraction of the frame width, centred
    pub length: f32,
    pub colour: Colour,
    pub space_before: f32,
    pub space_after: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VerticalPosition {
    Top,
    Bottom,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HorizontalPosition {
    Left,
    Center,
    Right,
    /// Alternates with page parity, away from the binding
    Outer,
    /// Alternates with page parity, towards the binding
    Inner,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NumberPosition {
    pub vertical: VerticalPosition,
    pub horizontal: HorizontalPosition,
}

impl NumberPosition {
    fn parse_or(text: Option<&str>, fallback: NumberPosition) -> NumberPosition {
        let Some(text) = text else {
            return fallback;
        };
        let mut position = NumberPosition {
            vertical: VerticalPosition::Bottom,
            horizontal: HorizontalPosition::Center,
        };
        for part in text
            .split(['-', '_', ' '])
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
        {
            match part.as_str() {
                "top" | "header" => position.vertical = VerticalPosition::Top,
                "bottom" | "footer" => position.vertical = VerticalPosition::Bottom,
                "left" => position.horizontal = HorizontalPosition::Left,
                "center" | "centre" | "middle" => position.horizontal = HorizontalPosition::Center,
                "right" => position.horizontal = HorizontalPosition::Right,
                "outer" | "outside" => position.horizontal = HorizontalPosition::Outer,
                "inner" | "inside" => position.horizontal = HorizontalPosition::Inner,
                other => {
                    log::warn!(
                        "Unknown page number position `{other}` in `{text}`, using {fallback:?}"
                    );
                    return fallback;
                }
            }
        }
        position
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Numerals {
    Arabic,
    RomanLower,
    RomanUpper,
}

impl Numerals {
    fn parse_or(text: Option<&str>, fallback: Numerals) -> Numerals {
        match text.map(str::trim) {
            None => fallback,
            Some("arabic") | Some("Arabic") | Some("decimal") => Numerals::Arabic,
            Some("roman") | Some("roman_lower") => Numerals::RomanLower,
            Some("ROMAN") | Some("roman_upper") => Numerals::RomanUpper,
            Some(other) => {
                log::warn!("Unknown page number style `{other}`, using {fallback:?}");
                fallback
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageNumberStyle {
    pub show: bool,
    /// Template with `{current}` and `{total}` placeholders
    pub format: String,
    pub position: NumberPosition,
    pub numerals: Numerals,
    /// The first page (1-based) that shows a number
    pub start_page: usize,
    pub text: TextStyle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TitlePageStyle {
    pub show: bool,
    pub title: TextStyle,
    pub author: TextStyle,
    pub author_prefix: String,
    pub part: TextStyle,
    /// Fraction of the page height above the title
    pub top: f32,
    /// Fraction of the page height between title and author
    pub between: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TocStyle {
    pub show: bool,
    pub title_text: String,
    pub title: TextStyle,
    /// One style per TOC level, never empty
    pub levels: Vec<TextStyle>,
    pub depth: u8,
    pub dot_leader: bool,
}

impl TocStyle {
    pub fn level(&self, level: u8) -> &TextStyle {
        let i = (level as usize).min(self.levels.len().saturating_sub(1));
        &self.levels[i]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChapterStyle {
    pub number: Option<TextStyle>,
    pub number_prefix: String,
    pub title: TextStyle,
    pub divider: Option<Divider>,
    pub break_before: bool,
    pub break_after: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SectionStyle {
    pub title: TextStyle,
    pub divider: Option<Divider>,
    pub numbered: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CodeStyle {
    pub text: TextStyle,
    pub background: Colour,
    pub theme: String,
    pub highlight: bool,
    pub padding: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableStyle {
    pub text: TextStyle,
    pub header: TextStyle,
    pub header_background: Colour,
    pub grid: Colour,
    pub padding: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageStyle {
    pub max_width: f32,
    pub space_before: f32,
    pub space_after: f32,
    pub full_page_threshold: f32,
    pub full_page_break: bool,
    pub caption: TextStyle,
}

/// The region of a page that content flows into, in PDF coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frame {
    pub left: f32,
    pub bottom: f32,
    pub width: f32,
    pub height: f32,
}

impl Frame {
    pub fn top(&self) -> f32 {
        self.bottom + self.height
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }
}

/// A style with every value concrete, for one page size.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedStyle {
    pub name: String,
    pub page_size: PageSize,
    pub geometry: PageGeometry,
    pub margins: Margins,
    pub page_numbers: PageNumberStyle,
    pub title_page: TitlePageStyle,
    pub toc: TocStyle,
    pub chapter: ChapterStyle,
    pub section: SectionStyle,
    /// Headings inside sections, level 1 first
    pub headings: Vec<TextStyle>,
    pub body: TextStyle,
    pub code: CodeStyle,
    pub table: TableStyle,
    pub images: ImageStyle,
    pub error: TextStyle,
}

impl ResolvedStyle {
    pub fn frame(&self) -> Frame {
        Frame {
            left: self.margins.left,
            bottom: self.margins.bottom,
            width: self.geometry.width - self.margins.left - self.margins.right,
            height: self.geometry.height - self.margins.top - self.margins.bottom,
        }
    }

    /// Style for an in-section heading of `level` (1-based), clamped to the deepest level.
    pub fn heading(&self, level: u8) -> &TextStyle {
        let i = (level.max(1) as usize - 1).min(self.headings.len().saturating_sub(1));
        &self.headings[i]
    }

    fn texts_mut(&mut self) -> Vec<&mut TextStyle> {
        let mut texts = vec![
            &mut self.page_numbers.text,
            &mut self.title_page.title,
            &mut self.title_page.author,
            &mut self.title_page.part,
            &mut self.toc.title,
            &mut self.chapter.title,
            &mut self.section.title,
            &mut self.body,
            &mut self.code.text,
            &mut self.table.text,
            &mut self.table.header,
            &mut self.images.caption,
            &mut self.error,
        ];
        if let Some(number) = &mut self.chapter.number {
            texts.push(number);
        }
        texts.extend(self.toc.levels.iter_mut());
        texts.extend(self.headings.iter_mut());
        texts
    }
}

/// Defaults for one text group, used where the descriptor is silent.
struct TextDefaults {
    font: &'static str,
    size: f32,
    leading: Option<f32>,
    colour: Colour,
    alignment: Alignment,
    space_before: f32,
    space_after: f32,
    indent: f32,
    case: TextCase,
    class: TextClass,
}

impl TextDefaults {
    const fn new(font: &'static str, size: f32, class: TextClass) -> TextDefaults {
        TextDefaults {
            font,
            size,
            leading: None,
            colour: colour::BLACK,
            alignment: Alignment::Left,
            space_before: 0.0,
            space_after: 0.0,
            indent: 0.0,
            case: TextCase::AsIs,
            class,
        }
    }
}

fn positive(value: f32, what: &str) -> Result<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(anyhow!("`{what}` must be positive, got {value}"))
    }
}

fn non_negative(value: f32, what: &str) -> Result<f32> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(anyhow!("`{what}` must not be negative, got {value}"))
    }
}

fn text_style(d: &TextDescriptor, defaults: TextDefaults, path: &str) -> Result<TextStyle> {
    let size = positive(d.size.unwrap_or(defaults.size), &format!("{path}.size"))?;
    let leading = positive(
        d.leading
            .or(defaults.leading)
            .unwrap_or((size * 1.2).max(size + 2.0)),
        &format!("{path}.leading"),
    )?;
    Ok(TextStyle {
        font: d.font.clone().unwrap_or_else(|| defaults.font.to_string()),
        bold: false,
        italic: false,
        size,
        leading,
        colour: Colour::parse_or(d.color.as_deref(), defaults.colour),
        alignment: Alignment::parse_or(d.alignment.as_deref(), defaults.alignment),
        space_before: non_negative(
            d.space_before.unwrap_or(defaults.space_before),
            &format!("{path}.space_before"),
        )?,
        space_after: non_negative(
            d.space_after.unwrap_or(defaults.space_after),
            &format!("{path}.space_after"),
        )?,
        indent: non_negative(d.indent.unwrap_or(defaults.indent), &format!("{path}.indent"))?,
        case: TextCase::parse_or(d.case.as_deref(), defaults.case),
        class: defaults.class,
    })
}

fn divider(
    d: &DividerDescriptor,
    fallback: Option<RuleKind>,
    path: &str,
) -> Result<Option<Divider>> {
    let kind = match d.kind.as_deref().map(|k| k.trim().to_ascii_lowercase()).as_deref() {
        None => fallback,
        Some("none") | Some("") => None,
        Some("solid") | Some("line") => Some(RuleKind::Solid),
        Some("dotted") => Some(RuleKind::Dotted),
        Some("dashed") => Some(RuleKind::Dashed),
        Some(other) => {
            log::warn!("Unknown divider type `{other}` at `{path}`, drawing a solid rule");
            Some(RuleKind::Solid)
        }
    };
    let Some(kind) = kind else {
        return Ok(None);
    };
    Ok(Some(Divider {
        kind,
        width: positive(d.width.unwrap_or(1.0), &format!("{path}.width"))?,
        length: d.length.unwrap_or(1.0).clamp(0.05, 1.0),
        colour: Colour::parse_or(d.color.as_deref(), Colour::new_rgb_bytes(0x80, 0x80, 0x80)),
        space_before: non_negative(
            d.spacing.before.unwrap_or(6.0),
            &format!("{path}.spacing.before"),
        )?,
        space_after: non_negative(
            d.spacing.after.unwrap_or(18.0),
            &format!("{path}.spacing.after"),
        )?,
    }))
}

/// Owns the font registry and resolves descriptors against it.
pub struct StyleResolver {
    fonts: FontRegistry,
}

impl StyleResolver {
    pub fn new<P: Into<PathBuf>>(fonts_dir: P) -> StyleResolver {
        StyleResolver {
            fonts: FontRegistry::new(fonts_dir),
        }
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    pub fn resolve_font(&self, logical: &str, bold: bool, italic: bool) -> FontId {
        self.fonts.resolve(logical, bold, italic)
    }

    /// Registers the descriptor's fonts and produces a concrete style.
    ///
    /// Only structurally impossible values are errors: non-positive sizes, negative
    /// spacing, or margins that leave no room for content. Everything else falls back.
    pub fn resolve(&mut self, descriptor: &StyleDescriptor) -> Result<ResolvedStyle> {
        for (logical, variants) in descriptor
            .fonts
            .entries()
            .into_iter()
            .chain(descriptor.custom_fonts.entries())
        {
            let files = FontFiles {
                normal: variants.normal,
                bold: variants.bold,
                italic: variants.italic,
                bold_italic: variants.bold_italic,
            };
            self.fonts.register_family(&logical, &files);
        }

        let page_size = resolve_page_size(descriptor)?;
        let geometry = page_size.geometry();
        let m = &descriptor.page.margins;
        let margins = Margins {
            top: non_negative(m.top.unwrap_or(72.0), "page.margins.top")?,
            right: non_negative(m.right.unwrap_or(72.0), "page.margins.right")?,
            bottom: non_negative(m.bottom.unwrap_or(72.0), "page.margins.bottom")?,
            left: non_negative(m.left.unwrap_or(72.0), "page.margins.left")?,
        };
        check_margins(geometry, &margins)?;

        let body = text_style(
            &descriptor.body_text,
            TextDefaults {
                leading: Some(14.0),
                alignment: Alignment::Justified,
                space_after: 12.0,
                ..TextDefaults::new("Helvetica", 12.0, TextClass::Body)
            },
            "body_text",
        )?;

        let pn = &descriptor.page_numbers;
        let page_numbers = PageNumberStyle {
            show: pn.show.unwrap_or(true),
            format: pn
                .format
                .clone()
                .unwrap_or_else(|| "{current} of {total}".to_string()),
            position: NumberPosition::parse_or(
                pn.position.as_deref(),
                NumberPosition {
                    vertical: VerticalPosition::Bottom,
                    horizontal: HorizontalPosition::Right,
                },
            ),
            numerals: Numerals::parse_or(pn.style.as_deref(), Numerals::Arabic),
            start_page: pn.start_page.unwrap_or(2).max(1) as usize,
            text: text_style(
                &TextDescriptor {
                    font: pn.font.clone(),
                    size: pn.size,
                    color: pn.color.clone(),
                    ..Default::default()
                },
                TextDefaults::new("Helvetica", 9.0, TextClass::Caption),
                "page_numbers",
            )?,
        };

        let tp = &descriptor.title_page;
        let title_page = TitlePageStyle {
            show: tp.show.unwrap_or(true),
            title: text_style(
                &tp.title,
                TextDefaults {
                    alignment: Alignment::Center,
                    ..TextDefaults::new("Helvetica-Bold", 24.0, TextClass::Heading)
                },
                "title_page.title",
            )?,
            author: text_style(
                &tp.author,
                TextDefaults {
                    alignment: Alignment::Center,
                    ..TextDefaults::new("Helvetica", 14.0, TextClass::Heading)
                },
                "title_page.author",
            )?,
            author_prefix: tp.author.prefix.clone().unwrap_or_else(|| "By".to_string()),
            part: text_style(
                &tp.part,
                TextDefaults {
                    alignment: Alignment::Center,
                    ..TextDefaults::new("Helvetica", 12.0, TextClass::Caption)
                },
                "title_page.part",
            )?,
            top: tp.spacing.top.unwrap_or(0.35).clamp(0.0, 0.9),
            between: tp.spacing.between.unwrap_or(0.05).clamp(0.0, 0.5),
        };

        let toc_d = &descriptor.table_of_contents;
        let level_defaults = |level: usize| match level {
            0 => TextDefaults {
                leading: Some(14.0),
                indent: 20.0,
                ..TextDefaults::new("Helvetica", 12.0, TextClass::Body)
            },
            _ => TextDefaults {
                leading: Some(12.0),
                indent: 20.0 * (level as f32 + 1.0),
                colour: Colour::new_rgb_bytes(0x33, 0x33, 0x33),
                ..TextDefaults::new("Helvetica", 10.0, TextClass::Body)
            },
        };
        let mut levels = toc_d
            .level_styles
            .iter()
            .enumerate()
            .map(|(i, d)| {
                text_style(d, level_defaults(i), &format!("table_of_contents.level_styles[{i}]"))
            })
            .collect::<Result<Vec<TextStyle>>>()?;
        let depth = toc_d.depth.unwrap_or(2).max(1);
        while levels.len() < depth as usize {
            let i = levels.len();
            levels.push(text_style(
                &TextDescriptor::default(),
                level_defaults(i),
                "table_of_contents",
            )?);
        }
        let toc = TocStyle {
            show: toc_d.show.unwrap_or(true),
            title_text: toc_d
                .title
                .text
                .clone()
                .unwrap_or_else(|| "Table of Contents".to_string()),
            title: text_style(
                &toc_d.title,
                TextDefaults {
                    alignment: Alignment::Center,
                    space_after: 20.0,
                    ..TextDefaults::new("Helvetica-Bold", 16.0, TextClass::Heading)
                },
                "table_of_contents.title",
            )?,
            levels,
            depth,
            dot_leader: toc_d.dot_leader.unwrap_or(true),
        };

        let ch = &descriptor.chapter;
        let chapter = ChapterStyle {
            number: match ch.number.show.unwrap_or(true) {
                true => Some(text_style(
                    &ch.number,
                    TextDefaults {
                        alignment: Alignment::Center,
                        space_after: 6.0,
                        case: TextCase::Upper,
                        ..TextDefaults::new("Helvetica", 12.0, TextClass::Caption)
                    },
                    "chapter.number",
                )?),
                false => None,
            },
            number_prefix: ch.number.prefix.clone().unwrap_or_else(|| "Chapter".to_string()),
            title: text_style(
                &ch.title,
                TextDefaults {
                    alignment: Alignment::Center,
                    space_after: 12.0,
                    ..TextDefaults::new("Helvetica-Bold", 18.0, TextClass::Heading)
                },
                "chapter.title",
            )?,
            divider: divider(&ch.divider, Some(RuleKind::Dotted), "chapter.divider")?,
            break_before: ch.page_break.before.unwrap_or(true),
            break_after: ch.page_break.after.unwrap_or(false),
        };

        let sec = &descriptor.section;
        let section = SectionStyle {
            title: text_style(
                &sec.title,
                TextDefaults {
                    leading: Some(18.0),
                    space_before: 30.0,
                    space_after: 20.0,
                    ..TextDefaults::new("Helvetica-Bold", 14.0, TextClass::Heading)
                },
                "section.title",
            )?,
            divider: divider(&sec.divider, None, "section.divider")?,
            numbered: sec.numbered.unwrap_or(true),
        };

        let headings = (1..=4)
            .map(|level| {
                let step = (4 - level) as f32 / 3.0;
                let size = body.size + (section.title.size - body.size).max(0.0) * step;
                TextStyle {
                    size,
                    leading: size * 1.25,
                    space_before: body.space_after.max(6.0),
                    space_after: 6.0,
                    alignment: Alignment::Left,
                    class: TextClass::Heading,
                    ..section.title.clone()
                }
            })
            .collect();

        let c = &descriptor.code;
        let code_text = text_style(
            &TextDescriptor {
                font: c.font.clone(),
                size: c.size,
                leading: c.leading,
                color: c.color.clone(),
                space_before: c.space_before,
                space_after: c.space_after,
                ..Default::default()
            },
            TextDefaults {
                leading: Some(11.0),
                space_before: 6.0,
                space_after: 12.0,
                ..TextDefaults::new("Courier", 9.0, TextClass::Body)
            },
            "code",
        )?;
        let code = CodeStyle {
            text: code_text,
            background: Colour::parse_or(
                c.background.as_deref(),
                Colour::new_rgb_bytes(0xF5, 0xF5, 0xF5),
            ),
            theme: c.theme.clone().unwrap_or_else(|| "InspiredGitHub".to_string()),
            highlight: c.highlight.unwrap_or(true),
            padding: non_negative(c.padding.unwrap_or(6.0), "code.padding")?,
        };

        let t = &descriptor.table;
        let table_text = text_style(
            &TextDescriptor {
                font: t.font.clone(),
                size: t.size,
                leading: t.leading,
                color: t.color.clone(),
                space_before: t.space_before,
                space_after: t.space_after,
                ..Default::default()
            },
            TextDefaults {
                leading: Some(12.0),
                space_before: 6.0,
                space_after: 12.0,
                ..TextDefaults::new(
                    body_font_or(&descriptor.body_text, "Helvetica"),
                    10.0,
                    TextClass::Body,
                )
            },
            "table",
        )?;
        let table = TableStyle {
            header: TextStyle {
                bold: true,
                ..table_text.clone()
            },
            text: table_text,
            header_background: Colour::parse_or(
                t.header_background.as_deref(),
                Colour::new_rgb_bytes(0xD3, 0xD3, 0xD3),
            ),
            grid: Colour::parse_or(
                t.grid_color.as_deref(),
                Colour::new_rgb_bytes(0x80, 0x80, 0x80),
            ),
            padding: non_negative(t.padding.unwrap_or(4.0), "table.padding")?,
        };

        let im = &descriptor.images;
        let images = ImageStyle {
            max_width: positive(im.max_width.unwrap_or(450.0), "images.max_width")?,
            space_before: non_negative(im.space_before.unwrap_or(12.0), "images.space_before")?,
            space_after: non_negative(im.space_after.unwrap_or(12.0), "images.space_after")?,
            full_page_threshold: im.full_page_threshold.unwrap_or(0.8).clamp(0.1, 1.0),
            full_page_break: im.full_page_break.unwrap_or(true),
            caption: text_style(
                &im.caption,
                TextDefaults {
                    leading: Some(12.0),
                    colour: Colour::new_rgb_bytes(0x33, 0x33, 0x33),
                    alignment: Alignment::Center,
                    space_after: 6.0,
                    ..TextDefaults::new("Helvetica-Oblique", 10.0, TextClass::Caption)
                },
                "images.caption",
            )?,
        };

        let error = TextStyle {
            italic: true,
            colour: colour::ERROR_RED,
            alignment: Alignment::Left,
            ..body.clone()
        };

        let style = ResolvedStyle {
            name: descriptor.name.clone().unwrap_or_else(|| "default".to_string()),
            page_size,
            geometry,
            margins,
            page_numbers,
            title_page,
            toc,
            chapter,
            section,
            headings,
            body,
            code,
            table,
            images,
            error,
        };
        log::debug!(
            "Resolved style `{}` for {} with a {:.0}×{:.0}pt frame",
            style.name,
            style.page_size,
            style.frame().width,
            style.frame().height
        );
        Ok(style)
    }

    /// Derives a style for `target`, scaling margins to the new proportions and, when the
    /// page is much smaller, shrinking text down to per-class minimum sizes.
    pub fn scale_for(style: &ResolvedStyle, target: PageSize) -> ResolvedStyle {
        let from = style.geometry;
        let to = target.geometry();
        let width_scale = to.width / from.width;
        let height_scale = to.height / from.height;

        let mut scaled = style.clone();
        scaled.page_size = target;
        scaled.geometry = to;
        let scale_margin = |m: f32, s: f32| (m * s).max(MIN_MARGIN.min(m));
        scaled.margins = Margins {
            top: scale_margin(style.margins.top, height_scale),
            right: scale_margin(style.margins.right, width_scale),
            bottom: scale_margin(style.margins.bottom, height_scale),
            left: scale_margin(style.margins.left, width_scale),
        };
        scaled.images.max_width = style.images.max_width * width_scale;

        let area_ratio = to.area() / from.area();
        if area_ratio < FONT_SCALE_AREA_RATIO {
            let factor = width_scale.min(height_scale).min(1.0).max(MIN_FONT_FACTOR);
            log::debug!("Scaling text by {factor:.2} for {target}");
            for text in scaled.texts_mut() {
                text.scale(factor);
            }
            for divider in [&mut scaled.chapter.divider, &mut scaled.section.divider]
                .into_iter()
                .flatten()
            {
                divider.space_before = scale_spacing(divider.space_before, factor);
                divider.space_after = scale_spacing(divider.space_after, factor);
            }
            scaled.code.padding *= factor;
            scaled.table.padding *= factor;
            scaled.images.space_before = scale_spacing(style.images.space_before, factor);
            scaled.images.space_after = scale_spacing(style.images.space_after, factor);
        }
        scaled
    }
}

/// Errors when `margins` leave no frame on a page of `geometry`.
pub fn check_margins(geometry: PageGeometry, margins: &Margins) -> Result<()> {
    if margins.left + margins.right >= geometry.width
        || margins.top + margins.bottom >= geometry.height
    {
        return Err(anyhow!(
            "Page margins leave no room for content on a {}×{}pt page",
            geometry.width,
            geometry.height
        ));
    }
    Ok(())
}

fn body_font_or(body: &TextDescriptor, fallback: &'static str) -> &'static str {
    // table text follows the body family only for the built-in families
    match body.font.as_deref().map(|f| f.split('-').next().unwrap_or(f)) {
        Some("Times") => "Times-Roman",
        Some("Courier") => "Courier",
        _ => fallback,
    }
}

fn resolve_page_size(descriptor: &StyleDescriptor) -> Result<PageSize> {
    let page = &descriptor.page;
    let name = page.size.as_deref().unwrap_or("A4");
    if name.eq_ignore_ascii_case("custom") {
        let width = page
            .width
            .ok_or_else(|| anyhow!("`page.width` is required for a CUSTOM page size"))?;
        let height = page
            .height
            .ok_or_else(|| anyhow!("`page.height` is required for a CUSTOM page size"))?;
        return Ok(PageSize::Custom {
            width: positive(width, "page.width")?,
            height: positive(height, "page.height")?,
        });
    }
    Ok(name.parse::<PageSize>().unwrap_or_else(|e| {
        log::warn!("{e}, using A4");
        PageSize::A4
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::descriptor::DescriptorFormat;

    fn resolve(json: &str) -> Result<ResolvedStyle> {
        let descriptor = StyleDescriptor::parse(json, DescriptorFormat::Json)?;
        StyleResolver::new("fonts").resolve(&descriptor)
    }

    #[test]
    fn can_resolve_empty_descriptor() {
        let style = resolve("{}").expect("defaults resolve");
        assert_eq!(style.page_size, PageSize::A4);
        assert_eq!(
            style.margins,
            Margins {
                top: 72.0,
                right: 72.0,
                bottom: 72.0,
                left: 72.0,
            }
        );
        assert_eq!(style.body.size, 12.0);
        assert_eq!(style.body.alignment, Alignment::Justified);
        assert_eq!(style.page_numbers.format, "{current} of {total}");
        assert_eq!(style.page_numbers.start_page, 2);
        assert_eq!(style.toc.levels.len(), 2);
        assert_eq!(style.images.full_page_threshold, 0.8);
    }

    #[test]
    fn can_resolve_bundled_styles() {
        let mut resolver = StyleResolver::new("fonts");
        let classic = resolver
            .resolve(&StyleDescriptor::classic().expect("classic parses"))
            .expect("classic resolves");
        assert_eq!(classic.body.font, "Times-Roman");
        assert_eq!(classic.chapter.divider.as_ref().map(|d| d.kind), Some(RuleKind::Dotted));
        let modern = resolver
            .resolve(&StyleDescriptor::modern().expect("modern parses"))
            .expect("modern resolves");
        assert_eq!(modern.page_size, PageSize::Letter);
        assert_eq!(modern.page_numbers.position.horizontal, HorizontalPosition::Outer);
    }

    #[test]
    fn rejects_impossible_geometry() {
        assert!(resolve(r#"{"page": {"margins": {"left": 400, "right": 400}}}"#).is_err());
        assert!(resolve(r#"{"body_text": {"size": 0}}"#).is_err());
        assert!(resolve(r#"{"page": {"size": "CUSTOM", "width": -5, "height": 100}}"#).is_err());
    }

    #[test]
    fn unknown_values_fall_back() {
        let style = resolve(
            r#"{"page": {"size": "FOOLSCAP"}, "body_text": {"alignment": "diagonal", "color": "mauve-ish"}}"#,
        )
        .expect("soft problems resolve");
        assert_eq!(style.page_size, PageSize::A4);
        assert_eq!(style.body.alignment, Alignment::Justified);
        assert_eq!(style.body.colour, colour::BLACK);
    }

    #[test]
    fn can_parse_number_positions() {
        let pos = NumberPosition::parse_or(Some("top-left"), NumberPosition {
            vertical: VerticalPosition::Bottom,
            horizontal: HorizontalPosition::Right,
        });
        assert_eq!(pos.vertical, VerticalPosition::Top);
        assert_eq!(pos.horizontal, HorizontalPosition::Left);
    }

    #[test]
    fn can_apply_text_case() {
        assert_eq!(TextCase::Upper.apply("Chapter 1"), "CHAPTER 1");
        assert_eq!(TextCase::Title.apply("the long road"), "The Long Road");
    }

    #[test]
    fn scaling_to_the_same_size_changes_nothing() {
        let style = resolve("{}").expect("defaults resolve");
        assert_eq!(StyleResolver::scale_for(&style, PageSize::A4), style);
    }

    #[test]
    fn similar_sizes_only_scale_margins() {
        let style = resolve("{}").expect("defaults resolve");
        let letter = StyleResolver::scale_for(&style, PageSize::Letter);
        assert_eq!(letter.body.size, style.body.size);
        assert!(letter.margins.left > style.margins.left);
        assert!(letter.margins.top < style.margins.top);
    }

    #[test]
    fn small_pages_shrink_text_to_floors() {
        let style = resolve(r#"{"images": {"caption": {"size": 6.5}}}"#).expect("resolves");
        let trade = StyleResolver::scale_for(&style, PageSize::UsTrade);
        assert!((trade.body.size - 12.0 * MIN_FONT_FACTOR).abs() < 0.01);
        assert!(trade.images.caption.size >= TextClass::Caption.min_size());
        assert!(trade.margins.left >= MIN_MARGIN);

        let tiny = StyleResolver::scale_for(
            &style,
            PageSize::Custom {
                width: 100.0,
                height: 150.0,
            },
        );
        assert!(tiny.body.size >= TextClass::Body.min_size());
        assert!(tiny.margins.left >= MIN_MARGIN);
        // the unscaled style is untouched
        assert_eq!(style.body.size, 12.0);
    }

    #[test]
    fn scaled_margin_floors_can_leave_no_frame() {
        let style = resolve("{}").expect("defaults resolve");
        let scaled = StyleResolver::scale_for(
            &style,
            PageSize::Custom {
                width: 30.0,
                height: 30.0,
            },
        );
        assert!(check_margins(scaled.geometry, &scaled.margins).is_err());
        assert!(check_margins(style.geometry, &style.margins).is_ok());
    }
}
