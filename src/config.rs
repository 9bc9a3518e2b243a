use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "book-press.toml";

/// Complete configuration for a book-press project.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Configuration {
    #[serde(default)]
    pub input: Input,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub output: Output,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Input {
    /// The document to typeset, nested or flat-record JSON
    #[serde(default = "default_content")]
    pub content: PathBuf,
    /// Base directory for relative image paths; defaults to the content file's directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_dir: Option<PathBuf>,
}

fn default_content() -> PathBuf {
    PathBuf::from("content.json")
}

impl Default for Input {
    fn default() -> Self {
        Input {
            content: default_content(),
            images_dir: None,
        }
    }
}

impl Input {
    pub fn images_dir(&self) -> PathBuf {
        match &self.images_dir {
            Some(dir) => dir.clone(),
            None => self
                .content
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Style {
    /// Style descriptor (`.json`, `.yaml` or `.toml`); the bundled classic style if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_fonts_dir")]
    pub fonts_dir: PathBuf,
}

fn default_fonts_dir() -> PathBuf {
    PathBuf::from("fonts")
}

impl Default for Style {
    fn default() -> Self {
        Style {
            path: None,
            fonts_dir: default_fonts_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Output {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Defaults to the book title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
    /// Page sizes to render, e.g. `["A4", "LETTER"]`; the style's own size if empty
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages_per_part: Option<u32>,
}

fn default_directory() -> PathBuf {
    PathBuf::from("output")
}

impl Default for Output {
    fn default() -> Self {
        Output {
            directory: default_directory(),
            base_name: None,
            formats: Vec::new(),
            max_pages_per_part: None,
        }
    }
}

impl Configuration {
    /// Loads the configuration file, or the defaults if it doesn't exist.
    pub fn load(path: &Path) -> Result<Configuration> {
        if !path.exists() {
            log::info!("{} not found, using default configuration", path.display());
            return Ok(Configuration::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to load {} contents", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// The configuration `init` writes: defaults plus the bundled styles.
    pub fn starter() -> Configuration {
        Configuration {
            style: Style {
                path: Some(PathBuf::from("styles/classic.json")),
                ..Style::default()
            },
            ..Configuration::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_serialize() {
        let config = Configuration::starter();
        let text = toml::to_string_pretty(&config).expect("can serialize configuration to TOML");
        let back: Configuration = toml::from_str(&text).expect("can parse it back");
        assert_eq!(back, config);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Configuration = toml::from_str("").expect("empty config parses");
        assert_eq!(config, Configuration::default());
        assert_eq!(config.output.directory, PathBuf::from("output"));
        assert_eq!(config.input.images_dir(), PathBuf::from(""));
    }

    #[test]
    fn can_parse_full_config() {
        let config: Configuration = toml::from_str(
            r#"
            [input]
            content = "book/content.json"

            [style]
            path = "styles/modern.yaml"

            [output]
            formats = ["A4", "LETTER"]
            max_pages_per_part = 120
            "#,
        )
        .expect("config parses");
        assert_eq!(config.input.images_dir(), PathBuf::from("book"));
        assert_eq!(config.style.fonts_dir, PathBuf::from("fonts"));
        assert_eq!(config.output.formats, vec!["A4", "LETTER"]);
        assert_eq!(config.output.max_pages_per_part, Some(120));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let config = Configuration::load(&dir.path().join(CONFIG_FILE)).expect("defaults load");
        assert_eq!(config, Configuration::default());
    }
}
