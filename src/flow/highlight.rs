//! Syntax highlighting of code blocks.

use crate::flow::CodeSpan;
use crate::style::resolver::CodeStyle;
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::HashSet;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

pub static SERIALIZED_SYNTAX: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/syntaxes.bin"));
pub static SERIALIZED_THEMES: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/themes.bin"));

const FALLBACK_THEME: &str = "InspiredGitHub";

pub struct CodeHighlighter {
    ss: SyntaxSet,
    ts: ThemeSet,
    warned: RefCell<HashSet<String>>,
}

impl CodeHighlighter {
    /// Loads the syntaxes and themes serialized at build time.
    pub fn load() -> Result<CodeHighlighter> {
        let (ss, _): (SyntaxSet, _) =
            bincode::serde::decode_from_slice(SERIALIZED_SYNTAX, bincode::config::standard())
                .map_err(|e| anyhow!("Failed to deserialize syntaxes: {e}"))?;
        let (ts, _): (ThemeSet, _) =
            bincode::serde::decode_from_slice(SERIALIZED_THEMES, bincode::config::standard())
                .map_err(|e| anyhow!("Failed to deserialize themes: {e}"))?;
        Ok(CodeHighlighter {
            ss,
            ts,
            warned: RefCell::new(HashSet::new()),
        })
    }

    fn warn_once(&self, message: String) {
        if self.warned.borrow_mut().insert(message.clone()) {
            log::warn!("{message}");
        }
    }

    /// Splits `code` into lines of coloured spans. Unknown languages, unknown themes and
    /// highlighting failures all produce plain lines in the code colour.
    pub fn highlight(
        &self,
        code: &str,
        language: Option<&str>,
        style: &CodeStyle,
    ) -> Vec<Vec<CodeSpan>> {
        let code = code.replace('\t', "    ");
        let plain = || {
            code.lines()
                .map(|line| {
                    vec![CodeSpan {
                        text: line.to_string(),
                        colour: style.text.colour,
                        bold: false,
                        italic: false,
                    }]
                })
                .collect::<Vec<Vec<CodeSpan>>>()
        };

        if !style.highlight {
            return plain();
        }
        let Some(syntax) = language.and_then(|l| {
            self.ss
                .find_syntax_by_token(l)
                .or_else(|| self.ss.find_syntax_by_extension(l))
        }) else {
            if let Some(language) = language {
                log::debug!("No syntax for `{language}`, rendering code plainly");
            }
            return plain();
        };
        let theme = match self.ts.themes.get(&style.theme) {
            Some(theme) => theme,
            None => {
                self.warn_once(format!(
                    "Unknown code theme `{}`, using {FALLBACK_THEME}",
                    style.theme
                ));
                match self.ts.themes.get(FALLBACK_THEME) {
                    Some(theme) => theme,
                    None => return plain(),
                }
            }
        };

        let mut h = HighlightLines::new(syntax, theme);
        let mut lines = Vec::new();
        for line in LinesWithEndings::from(code.as_str()) {
            let ranges = match h.highlight_line(line, &self.ss) {
                Ok(ranges) => ranges,
                Err(e) => {
                    log::warn!(
                        "Failed to highlight source code for line `{}`: {e}",
                        line.trim_end()
                    );
                    return plain();
                }
            };
            let spans = ranges
                .into_iter()
                .map(|(s, text)| CodeSpan {
                    text: text.trim_end_matches(['\n', '\r']).to_string(),
                    colour: crate::style::Colour::new_rgb_bytes(
                        s.foreground.r,
                        s.foreground.g,
                        s.foreground.b,
                    ),
                    bold: s.font_style.intersects(FontStyle::BOLD),
                    italic: s.font_style.intersects(FontStyle::ITALIC),
                })
                .filter(|span| !span.text.is_empty())
                .collect();
            lines.push(spans);
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{StyleDescriptor, StyleResolver};

    fn code_style() -> CodeStyle {
        StyleResolver::new("fonts")
            .resolve(&StyleDescriptor::default())
            .expect("defaults resolve")
            .code
    }

    #[test]
    fn can_highlight_known_languages() {
        let highlighter = CodeHighlighter::load().expect("can load highlighter");
        let lines =
            highlighter.highlight("fn main() {\n    let x = 1;\n}", Some("rust"), &code_style());
        assert_eq!(lines.len(), 3);
        assert!(lines[0].len() > 1, "keywords are split into their own spans");
        let first: String = lines[1].iter().map(|s| s.text.as_str()).collect();
        assert_eq!(first, "    let x = 1;");
    }

    #[test]
    fn unknown_languages_are_plain() {
        let highlighter = CodeHighlighter::load().expect("can load highlighter");
        let style = code_style();
        let lines = highlighter.highlight("a\tb\n\nc", Some("klingon"), &style);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0][0].text, "a    b");
        assert_eq!(lines[0][0].colour, style.text.colour);
    }
}
