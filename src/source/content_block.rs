use serde::{Deserialize, Serialize};

/// One typed piece of section content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Heading {
        #[serde(default = "default_heading_level")]
        level: u8,
        text: String,
    },
    Paragraph {
        text: String,
    },
    Code {
        #[serde(default, alias = "lang", skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(alias = "content", alias = "code")]
        text: String,
    },
    Table {
        #[serde(default)]
        headers: Vec<String>,
        #[serde(default)]
        rows: Vec<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Image {
        #[serde(alias = "src")]
        path: String,
        #[serde(default, alias = "alt", skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    #[serde(alias = "hr", alias = "rule")]
    HorizontalRule,
    Equation {
        #[serde(alias = "latex", alias = "content")]
        text: String,
    },
}

fn default_heading_level() -> u8 {
    1
}

/// Splits raw section text into blocks.
///
/// Blank lines separate paragraphs and single newlines become line breaks. Lines
/// starting with `#` are headings, ```` ``` ```` fences enclose code, a line holding
/// only `---` is a rule, and a line holding only `![caption](path)` is an image.
pub fn parse_raw_text(text: &str) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut code: Option<(Option<String>, Vec<&str>)> = None;

    fn flush(paragraph: &mut Vec<&str>, blocks: &mut Vec<ContentBlock>) {
        if !paragraph.is_empty() {
            blocks.push(ContentBlock::Paragraph {
                text: paragraph.join("<br/>"),
            });
            paragraph.clear();
        }
    }

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some((language, lines)) = &mut code {
            if trimmed.starts_with("```") {
                blocks.push(ContentBlock::Code {
                    language: language.take(),
                    text: lines.join("\n"),
                });
                code = None;
            } else {
                lines.push(line);
            }
            continue;
        }

        if let Some(fence) = trimmed.strip_prefix("```") {
            flush(&mut paragraph, &mut blocks);
            let language = Some(fence.trim().to_string()).filter(|l| !l.is_empty());
            code = Some((language, Vec::new()));
        } else if trimmed.is_empty() {
            flush(&mut paragraph, &mut blocks);
        } else if let Some((level, heading)) = heading(trimmed) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(ContentBlock::Heading {
                level,
                text: heading.to_string(),
            });
        } else if paragraph.is_empty() && matches!(trimmed, "---" | "***" | "___") {
            blocks.push(ContentBlock::HorizontalRule);
        } else if let Some((caption, path)) = image(trimmed) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(ContentBlock::Image {
                path: path.to_string(),
                caption: Some(caption.to_string()).filter(|c| !c.is_empty()),
            });
        } else {
            paragraph.push(trimmed);
        }
    }

    flush(&mut paragraph, &mut blocks);
    if let Some((language, lines)) = code {
        // an unterminated fence runs to the end of the text
        blocks.push(ContentBlock::Code {
            language,
            text: lines.join("\n"),
        });
    }
    blocks
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    Some((hashes as u8, rest.trim()))
}

fn image(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("![")?;
    let (caption, rest) = rest.split_once("](")?;
    let path = rest.strip_suffix(')')?;
    Some((caption, path.trim()))
}
