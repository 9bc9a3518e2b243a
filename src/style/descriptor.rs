//! The on-disk style descriptor.
//!
//! Every field is optional: missing values take documented defaults during resolution,
//! and keys this crate doesn't know about are ignored. Only values of the wrong type
//! (a string where a size belongs, say) are rejected, with the location of the mistake.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// The style bundled as `styles/classic.json`.
pub const CLASSIC_STYLE: &str = include_str!("../../styles/classic.json");
/// The style bundled as `styles/modern.json`.
pub const MODERN_STYLE: &str = include_str!("../../styles/modern.json");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleDescriptor {
    #[serde(alias = "style_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub page: PageDescriptor,
    pub fonts: FontsDescriptor,
    pub custom_fonts: FontsDescriptor,
    pub page_numbers: PageNumbersDescriptor,
    pub title_page: TitlePageDescriptor,
    pub table_of_contents: TocDescriptor,
    pub chapter: ChapterDescriptor,
    pub section: SectionDescriptor,
    #[serde(alias = "body")]
    pub body_text: TextDescriptor,
    pub code: CodeDescriptor,
    pub table: TableDescriptor,
    pub images: ImagesDescriptor,
}

/// Styling shared by every block of text: titles, body, captions, TOC lines and so on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDescriptor {
    #[serde(alias = "font_name", skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(alias = "font_size", skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leading: Option<f32>,
    #[serde(alias = "text_color", alias = "colour", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_before: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_after: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indent: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    pub margins: MarginsDescriptor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginsDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<f32>,
}

/// Font definitions, either keyed by logical name or as a list of named entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontsDescriptor {
    Map(BTreeMap<String, FontDescriptor>),
    List(Vec<NamedFontDescriptor>),
}

impl Default for FontsDescriptor {
    fn default() -> Self {
        FontsDescriptor::Map(BTreeMap::new())
    }
}

impl FontsDescriptor {
    pub fn entries(&self) -> Vec<(String, FontVariants)> {
        match self {
            FontsDescriptor::Map(map) => map
                .iter()
                .map(|(name, font)| (name.clone(), font.variants()))
                .collect(),
            FontsDescriptor::List(list) => list
                .iter()
                .map(|font| (font.name.clone(), font.variants.clone()))
                .collect(),
        }
    }
}

/// A single file (or standard font name) or a set of variant files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontDescriptor {
    File(String),
    Variants(FontVariants),
}

impl FontDescriptor {
    pub fn variants(&self) -> FontVariants {
        match self {
            FontDescriptor::File(file) => FontVariants {
                normal: Some(file.clone()),
                ..Default::default()
            },
            FontDescriptor::Variants(variants) => variants.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontVariants {
    #[serde(alias = "regular", skip_serializing_if = "Option::is_none")]
    pub normal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold_italic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedFontDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub variants: FontVariants,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageNumbersDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,
    /// Template with `{current}` and `{total}` placeholders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// `arabic`, `roman` or `ROMAN`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// The first page (1-based) that shows a number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_page: Option<u32>,
    #[serde(alias = "font_name", skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(alias = "font_size", skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    #[serde(alias = "text_color", alias = "colour", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitlePageDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,
    pub title: TextDescriptor,
    pub author: TextDescriptor,
    pub part: TextDescriptor,
    pub spacing: TitleSpacingDescriptor,
}

/// Vertical placement on the title page, as fractions of the page height.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleSpacingDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub between: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TocDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,
    pub title: TextDescriptor,
    pub level_styles: Vec<TextDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot_leader: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterDescriptor {
    pub number: TextDescriptor,
    pub title: TextDescriptor,
    pub divider: DividerDescriptor,
    pub page_break: PageBreakDescriptor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionDescriptor {
    pub title: TextDescriptor,
    pub divider: DividerDescriptor,
    /// Prefix section titles with their source number, as in "2.1. Title"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numbered: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DividerDescriptor {
    /// `solid`, `dotted`, `dashed` or `none`
    #[serde(rename = "type", alias = "style", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    /// Fraction of the frame width the rule spans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f32>,
    #[serde(alias = "colour", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub spacing: SpacingDescriptor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpacingDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageBreakDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeDescriptor {
    #[serde(alias = "font_name", skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(alias = "font_size", skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leading: Option<f32>,
    #[serde(alias = "text_color", alias = "colour", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(alias = "background_color", skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    /// A syntect theme name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_before: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_after: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDescriptor {
    #[serde(alias = "font_name", skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(alias = "font_size", skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leading: Option<f32>,
    #[serde(alias = "text_color", alias = "colour", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_before: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_after: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_before: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_after: Option<f32>,
    /// Fraction of the frame height above which an image is laid out as full-page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_page_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_page_break: Option<bool>,
    pub caption: TextDescriptor,
}

impl StyleDescriptor {
    /// Loads a descriptor, picking the format from the file extension.
    pub fn load(path: &Path) -> Result<StyleDescriptor> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read style descriptor {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .unwrap_or("json")
            .to_ascii_lowercase();
        let format = match extension.as_str() {
            "yaml" | "yml" => DescriptorFormat::Yaml,
            "toml" => DescriptorFormat::Toml,
            _ => DescriptorFormat::Json,
        };
        StyleDescriptor::parse(&contents, format)
            .with_context(|| format!("Failed to parse style descriptor {}", path.display()))
    }

    pub fn parse(contents: &str, format: DescriptorFormat) -> Result<StyleDescriptor> {
        let descriptor = match format {
            DescriptorFormat::Json => serde_json::from_str(contents).map_err(|e| anyhow!(e))?,
            DescriptorFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| anyhow!(e))?,
            DescriptorFormat::Toml => toml::from_str(contents).map_err(|e| anyhow!(e))?,
        };
        Ok(descriptor)
    }

    pub fn classic() -> Result<StyleDescriptor> {
        StyleDescriptor::parse(CLASSIC_STYLE, DescriptorFormat::Json)
            .with_context(|| "Failed to parse the bundled classic style")
    }

    pub fn modern() -> Result<StyleDescriptor> {
        StyleDescriptor::parse(MODERN_STYLE, DescriptorFormat::Json)
            .with_context(|| "Failed to parse the bundled modern style")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DescriptorFormat {
    Json,
    Yaml,
    Toml,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_parse_empty_descriptor() {
        let style = StyleDescriptor::parse("{}", DescriptorFormat::Json).expect("can parse");
        assert_eq!(style, StyleDescriptor::default());
    }

    #[test]
    fn ignores_unknown_keys() {
        let style = StyleDescriptor::parse(
            r#"{"style_name": "x", "flourishes": {"a": 1}, "body_text": {"size": 11, "kerning": true}}"#,
            DescriptorFormat::Json,
        )
        .expect("can parse");
        assert_eq!(style.name.as_deref(), Some("x"));
        assert_eq!(style.body_text.size, Some(11.0));
    }

    #[test]
    fn rejects_wrongly_typed_values_with_location() {
        let err = StyleDescriptor::parse(
            "{\n  \"body_text\": {\n    \"size\": \"big\"\n  }\n}",
            DescriptorFormat::Json,
        )
        .expect_err("size must be a number");
        let message = format!("{err:#}");
        assert!(message.contains("line 3"), "{message}");
    }

    #[test]
    fn accepts_alternate_key_spellings() {
        let style = StyleDescriptor::parse(
            r##"{"body_text": {"font_name": "Times-Roman", "font_size": 10, "text_color": "#111111"}}"##,
            DescriptorFormat::Json,
        )
        .expect("can parse");
        assert_eq!(style.body_text.font.as_deref(), Some("Times-Roman"));
        assert_eq!(style.body_text.size, Some(10.0));
        assert_eq!(style.body_text.color.as_deref(), Some("#111111"));
    }

    #[test]
    fn accepts_font_maps_and_lists() {
        let style = StyleDescriptor::parse(
            r#"{"fonts": [], "custom_fonts": {"body": "Serif.ttf", "head": {"normal": "H.ttf", "bold": "HB.ttf"}}}"#,
            DescriptorFormat::Json,
        )
        .expect("can parse");
        assert!(style.fonts.entries().is_empty());
        let entries = style.custom_fonts.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "body");
        assert_eq!(entries[0].1.normal.as_deref(), Some("Serif.ttf"));
        assert_eq!(entries[1].1.bold.as_deref(), Some("HB.ttf"));
    }

    #[test]
    fn can_parse_yaml_and_toml() {
        let yaml = "page:\n  size: LETTER\nbody_text:\n  size: 11\n";
        let style = StyleDescriptor::parse(yaml, DescriptorFormat::Yaml).expect("can parse yaml");
        assert_eq!(style.page.size.as_deref(), Some("LETTER"));

        let toml = "[page]\nsize = \"A5\"\n[page.margins]\ntop = 50.0\n";
        let style = StyleDescriptor::parse(toml, DescriptorFormat::Toml).expect("can parse toml");
        assert_eq!(style.page.margins.top, Some(50.0));
    }

    #[test]
    fn can_parse_bundled_styles() {
        let classic = StyleDescriptor::classic().expect("classic parses");
        assert_eq!(classic.page.size.as_deref(), Some("A4"));
        assert_eq!(classic.page_numbers.start_page, Some(2));
        let modern = StyleDescriptor::modern().expect("modern parses");
        assert!(modern.name.is_some());
    }

    #[test]
    fn can_serialize_descriptor() {
        let classic = StyleDescriptor::classic().expect("classic parses");
        let json = serde_json::to_string_pretty(&classic).expect("can serialize");
        let reparsed = StyleDescriptor::parse(&json, DescriptorFormat::Json).expect("can parse");
        assert_eq!(reparsed, classic);
    }
}
