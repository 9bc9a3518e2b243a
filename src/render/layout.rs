//! Line breaking: the flow-breaking primitive under every paragraph, cell and listing.
//!
//! Text is broken greedily at whitespace using glyph advances from the font registry.
//! Words wider than the measure are split between characters, and preformatted text
//! keeps its whitespace and wraps by character.

use crate::flow::{CodeSpan, Inline};
use crate::style::fonts::{FontId, FontRegistry};
use crate::style::{Colour, TextStyle};

/// Text in a single face, ready to hand to the layout.
#[derive(Clone, Debug, PartialEq)]
pub enum Piece {
    Text {
        text: String,
        font: FontId,
        size: f32,
        colour: Colour,
    },
    Break,
}

/// A run of text on a line, all in one face and colour.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub font: FontId,
    pub size: f32,
    pub colour: Colour,
    pub width: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Line {
    pub fragments: Vec<Fragment>,
    pub width: f32,
    /// Ends a paragraph or a forced break, so it is never stretched when justifying
    pub last: bool,
}

impl Line {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn space_count(&self) -> usize {
        self.fragments
            .iter()
            .map(|f| f.text.matches(' ').count())
            .sum()
    }

    fn push(&mut self, fragment: Fragment) {
        self.width += fragment.width;
        if let Some(last) = self.fragments.last_mut() {
            if last.font == fragment.font
                && last.size == fragment.size
                && last.colour == fragment.colour
            {
                last.text.push_str(&fragment.text);
                last.width += fragment.width;
                return;
            }
        }
        self.fragments.push(fragment);
    }
}

/// Converts inline runs to pieces in `style`, resolving emphasis to physical faces.
pub fn pieces(runs: &[Inline], style: &TextStyle, fonts: &FontRegistry) -> Vec<Piece> {
    runs.iter()
        .map(|run| match run {
            Inline::Text { text, bold, italic } => Piece::Text {
                text: text.clone(),
                font: style.face(fonts, *bold, *italic),
                size: style.size,
                colour: style.colour,
            },
            Inline::LineBreak => Piece::Break,
        })
        .collect()
}

enum Token {
    Word(Vec<Fragment>),
    Space(Fragment),
    Break,
}

fn fragment(fonts: &FontRegistry, text: &str, font: FontId, size: f32, colour: Colour) -> Fragment {
    Fragment {
        text: text.to_string(),
        font,
        size,
        colour,
        width: fonts.text_width(font, text, size),
    }
}

fn tokenize(pieces: &[Piece], fonts: &FontRegistry) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word: Vec<Fragment> = Vec::new();

    for piece in pieces {
        let (text, font, size, colour) = match piece {
            Piece::Text {
                text,
                font,
                size,
                colour,
            } => (text, *font, *size, *colour),
            Piece::Break => {
                if !word.is_empty() {
                    tokens.push(Token::Word(std::mem::take(&mut word)));
                }
                tokens.push(Token::Break);
                continue;
            }
        };

        let mut segment = String::new();
        let mut in_space = false;
        for c in text.chars() {
            let space = c.is_whitespace() && c != '\u{a0}';
            if space != in_space && !segment.is_empty() {
                if in_space {
                    push_space(&mut tokens, &mut word, fragment(fonts, " ", font, size, colour));
                } else {
                    word.push(fragment(fonts, &segment, font, size, colour));
                }
                segment.clear();
            }
            in_space = space;
            segment.push(c);
        }
        if !segment.is_empty() {
            if in_space {
                push_space(&mut tokens, &mut word, fragment(fonts, " ", font, size, colour));
            } else {
                word.push(fragment(fonts, &segment, font, size, colour));
            }
        }
    }

    if !word.is_empty() {
        tokens.push(Token::Word(word));
    }
    tokens
}

fn push_space(tokens: &mut Vec<Token>, word: &mut Vec<Fragment>, space: Fragment) {
    if !word.is_empty() {
        tokens.push(Token::Word(std::mem::take(word)));
    }
    if !matches!(tokens.last(), Some(Token::Space(_))) {
        tokens.push(Token::Space(space));
    }
}

/// Appends `fragment` one character at a time, starting new lines whenever the
/// measure is exceeded.
fn push_chars(
    fonts: &FontRegistry,
    line: &mut Line,
    lines: &mut Vec<Line>,
    fragment: &Fragment,
    max_width: f32,
) {
    let mut buf = [0u8; 4];
    for c in fragment.text.chars() {
        let text = c.encode_utf8(&mut buf);
        let width = fonts.text_width(fragment.font, text, fragment.size);
        if !line.is_empty() && line.width + width > max_width {
            lines.push(std::mem::take(line));
        }
        line.push(Fragment {
            text: text.to_string(),
            width,
            ..fragment.clone()
        });
    }
}

/// Breaks pieces into lines no wider than `max_width`. Always returns at least one
/// line, which may be empty.
pub fn break_lines(pieces: &[Piece], fonts: &FontRegistry, max_width: f32) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line = Line::default();
    let mut pending_space: Option<Fragment> = None;

    for token in tokenize(pieces, fonts) {
        match token {
            Token::Space(space) => {
                if !line.is_empty() {
                    pending_space = Some(space);
                }
            }
            Token::Break => {
                line.last = true;
                lines.push(std::mem::take(&mut line));
                pending_space = None;
            }
            Token::Word(fragments) => {
                let width: f32 = fragments.iter().map(|f| f.width).sum();
                let space_width = pending_space.as_ref().map(|s| s.width).unwrap_or(0.0);
                if !line.is_empty() && line.width + space_width + width > max_width {
                    lines.push(std::mem::take(&mut line));
                    pending_space = None;
                }
                if let Some(space) = pending_space.take() {
                    line.push(space);
                }
                if line.is_empty() && width > max_width {
                    for fragment in &fragments {
                        push_chars(fonts, &mut line, &mut lines, fragment, max_width);
                    }
                } else {
                    for fragment in fragments {
                        line.push(fragment);
                    }
                }
            }
        }
    }

    if !line.is_empty() || lines.is_empty() {
        line.last = true;
        lines.push(line);
    }
    lines
}

/// Breaks one line of a code listing, keeping its whitespace.
pub fn break_code_line(
    spans: &[CodeSpan],
    style: &TextStyle,
    fonts: &FontRegistry,
    max_width: f32,
) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line = Line::default();
    for span in spans {
        let font = style.face(fonts, span.bold, span.italic);
        let fragment = Fragment {
            text: span.text.clone(),
            font,
            size: style.size,
            colour: span.colour,
            width: fonts.text_width(font, &span.text, style.size),
        };
        if line.width + fragment.width <= max_width {
            line.push(fragment);
        } else {
            push_chars(fonts, &mut line, &mut lines, &fragment, max_width);
        }
    }
    line.last = true;
    lines.push(line);
    lines
}
