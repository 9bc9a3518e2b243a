//! Normalisation of inline emphasis into [`Inline`] runs.
//!
//! Understands `<b>`/`<strong>`, `<i>`/`<em>`, `<br>` and the Markdown markers `**`,
//! `*` and `_`. Any other tag is kept as literal text, and HTML entities are decoded
//! after tags are recognised so that `&lt;b&gt;` prints as `<b>`. A Markdown marker
//! that is never closed is kept as literal text.

use crate::flow::Inline;
use std::collections::HashSet;

#[derive(Default)]
struct InlineParser {
    runs: Vec<Inline>,
    buffer: String,
    bold_tags: u32,
    italic_tags: u32,
    /// Where each open Markdown marker started
    md_bold: Option<usize>,
    md_italic: Option<usize>,
    md_underscore: Option<usize>,
}

impl InlineParser {
    fn bold(&self) -> bool {
        self.bold_tags > 0 || self.md_bold.is_some()
    }

    fn italic(&self) -> bool {
        self.italic_tags > 0 || self.md_italic.is_some() || self.md_underscore.is_some()
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let text = html_escape::decode_html_entities(&self.buffer).to_string();
        self.buffer.clear();
        let (bold, italic) = (self.bold(), self.italic());
        if let Some(Inline::Text {
            text: previous,
            bold: b,
            italic: i,
        }) = self.runs.last_mut()
        {
            if *b == bold && *i == italic {
                previous.push_str(&text);
                return;
            }
        }
        self.runs.push(Inline::Text { text, bold, italic });
    }

    /// Handles a tag's inner text, returning false when it isn't one we understand.
    fn tag(&mut self, inner: &str) -> bool {
        let name: String = inner
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match name.as_str() {
            "b" | "strong" => {
                self.flush();
                self.bold_tags += 1;
            }
            "i" | "em" => {
                self.flush();
                self.italic_tags += 1;
            }
            "/b" | "/strong" if self.bold_tags > 0 => {
                self.flush();
                self.bold_tags -= 1;
            }
            "/i" | "/em" if self.italic_tags > 0 => {
                self.flush();
                self.italic_tags -= 1;
            }
            "br" | "br/" => {
                self.flush();
                self.runs.push(Inline::LineBreak);
            }
            _ => return false,
        }
        true
    }

    fn toggle(&mut self, marker: Marker, at: usize) {
        self.flush();
        let open = match marker {
            Marker::Bold => &mut self.md_bold,
            Marker::Italic => &mut self.md_italic,
            Marker::Underscore => &mut self.md_underscore,
        };
        *open = match open {
            Some(_) => None,
            None => Some(at),
        };
    }

    fn unclosed(&self) -> Option<usize> {
        [self.md_bold, self.md_italic, self.md_underscore]
            .into_iter()
            .flatten()
            .min()
    }
}

#[derive(Copy, Clone)]
enum Marker {
    Bold,
    Italic,
    Underscore,
}

/// Parses rich text into runs. Whitespace is preserved; layout collapses it.
pub fn parse_inline(text: &str) -> Vec<Inline> {
    let chars: Vec<char> = text.chars().collect();
    let mut literal = HashSet::new();
    loop {
        let parser = parse_with(&chars, &literal);
        match parser.unclosed() {
            Some(at) => {
                literal.insert(at);
            }
            None => return parser.runs,
        }
    }
}

/// One parse, treating markers that start at `literal` positions as plain text.
fn parse_with(chars: &[char], literal: &HashSet<usize>) -> InlineParser {
    let mut parser = InlineParser::default();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();

        match c {
            '<' => {
                if let Some(len) = chars[i + 1..].iter().position(|c| *c == '>') {
                    let inner: String = chars[i + 1..i + 1 + len].iter().collect();
                    if parser.tag(&inner) {
                        i += len + 2;
                        continue;
                    }
                }
                parser.buffer.push(c);
            }
            '*' if next == Some('*') => {
                let opens = parser.md_bold.is_none()
                    && !literal.contains(&i)
                    && chars.get(i + 2).is_some_and(|c| !c.is_whitespace());
                let closes = parser.md_bold.is_some() && prev.is_some_and(|c| !c.is_whitespace());
                if opens || closes {
                    parser.toggle(Marker::Bold, i);
                } else {
                    parser.buffer.push_str("**");
                }
                i += 2;
                continue;
            }
            '*' => {
                let opens = parser.md_italic.is_none()
                    && !literal.contains(&i)
                    && next.is_some_and(|c| !c.is_whitespace());
                let closes = parser.md_italic.is_some() && prev.is_some_and(|c| !c.is_whitespace());
                if opens || closes {
                    parser.toggle(Marker::Italic, i);
                } else {
                    parser.buffer.push(c);
                }
            }
            '_' => {
                let opens = parser.md_underscore.is_none()
                    && !literal.contains(&i)
                    && !prev.is_some_and(|c| c.is_alphanumeric())
                    && next.is_some_and(|c| !c.is_whitespace());
                let closes = parser.md_underscore.is_some()
                    && !next.is_some_and(|c| c.is_alphanumeric())
                    && prev.is_some_and(|c| !c.is_whitespace());
                if opens || closes {
                    parser.toggle(Marker::Underscore, i);
                } else {
                    parser.buffer.push(c);
                }
            }
            _ => parser.buffer.push(c),
        }
        i += 1;
    }

    parser.flush();
    parser
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(text: &str, bold: bool, italic: bool) -> Inline {
        Inline::Text {
            text: text.to_string(),
            bold,
            italic,
        }
    }

    #[test]
    fn can_parse_tags() {
        assert_eq!(
            parse_inline("a <b>bold</b> and <em>it</em><br/>next"),
            vec![
                text("a ", false, false),
                text("bold", true, false),
                text(" and ", false, false),
                text("it", false, true),
                Inline::LineBreak,
                text("next", false, false),
            ]
        );
    }

    #[test]
    fn can_nest_tags() {
        assert_eq!(
            parse_inline("<strong>x <i>y</i></strong>"),
            vec![text("x ", true, false), text("y", true, true)]
        );
    }

    #[test]
    fn can_parse_markdown_markers() {
        assert_eq!(
            parse_inline("**bold** then *it* and _also_"),
            vec![
                text("bold", true, false),
                text(" then ", false, false),
                text("it", false, true),
                text(" and ", false, false),
                text("also", false, true),
            ]
        );
    }

    #[test]
    fn leaves_ordinary_symbols_alone() {
        assert_eq!(
            parse_inline("2 * 3 and snake_case_name"),
            vec![text("2 * 3 and snake_case_name", false, false)]
        );
    }

    #[test]
    fn keeps_unknown_markup_as_text() {
        assert_eq!(
            parse_inline("<span class=\"x\">hi</span> a < b"),
            vec![text("<span class=\"x\">hi</span> a < b", false, false)]
        );
        assert_eq!(parse_inline("</b>"), vec![text("</b>", false, false)]);
    }

    #[test]
    fn decodes_entities_after_tags() {
        assert_eq!(
            parse_inline("&lt;b&gt; &amp; <b>x</b>"),
            vec![text("<b> & ", false, false), text("x", true, false)]
        );
    }

    fn plain(runs: &[Inline]) -> String {
        runs.iter()
            .map(|run| match run {
                Inline::Text { text, .. } => text.as_str(),
                _ => "\n",
            })
            .collect()
    }

    #[test]
    fn keeps_unclosed_markers_as_text() {
        for input in [
            "price is 3*4 dollars",
            "**unclosed bold",
            "a stray _underscore here",
            "*one* and *two",
        ] {
            let runs = parse_inline(input);
            let expected = input.replace("*one*", "one");
            assert_eq!(plain(&runs), expected, "text of `{input}` changed");
        }
        assert_eq!(
            parse_inline("price is 3*4 dollars"),
            vec![text("price is 3*4 dollars", false, false)]
        );
        assert_eq!(
            parse_inline("**unclosed"),
            vec![text("**unclosed", false, false)]
        );
        assert_eq!(
            parse_inline("*one* and *two"),
            vec![
                text("one", false, true),
                text(" and *two", false, false),
            ]
        );
    }

    #[test]
    fn unclosed_markers_leave_later_emphasis_working() {
        assert_eq!(
            parse_inline("_stray then **bold**"),
            vec![text("_stray then ", false, false), text("bold", true, false)]
        );
    }
}
