use crate::source::ContentBlock;
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;

/// A long-form document: an ordered list of chapters of sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// The identifier the chapter had in its source, kept for reporting
    #[serde(default, alias = "chapter_id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "chapter_name", alias = "name")]
    pub title: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// A section holds either raw text or typed content blocks. When both are present,
/// the blocks win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(
        default,
        alias = "section_name",
        alias = "name",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(
        default,
        alias = "section_number",
        deserialize_with = "optional_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<ContentBlock>,
}

impl Section {
    pub fn content(&self) -> Cow<'_, [ContentBlock]> {
        match (&self.text, self.blocks.is_empty()) {
            (Some(text), true) => Cow::Owned(crate::source::parse_raw_text(text)),
            _ => Cow::Borrowed(&self.blocks),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Integer(i64),
    Float(f64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Integer(i) => i.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }
    }
}

pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(StringOrNumber::deserialize(d)?.into())
}

pub(crate) fn optional_string_or_number<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(d)?.map(String::from))
}
