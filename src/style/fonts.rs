//! Font registration and lookup.
//!
//! Every style resolves its text through a [`FontRegistry`]: a table of physical faces
//! (the built-in PDF fonts plus any TrueType files the style registers) and the logical
//! family names that map onto them. Lookups are total: anything that can't be found
//! falls back to a face that can, with a warning the first time it happens.

use crate::style::metrics::{encode_text, win_ansi_decode, BuiltinFace, BuiltinFamily};
use anyhow::{anyhow, Context, Result};
use owned_ttf_parser::{Face, GlyphId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// The family used whenever a requested family can't be found.
pub const DEFAULT_FAMILY: &str = "Helvetica";

/// Handle to a physical face held by a [`FontRegistry`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(usize);

impl FontId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Metrics and data for a TrueType file, embedded as a simple WinAnsi font.
#[derive(Debug, Clone)]
pub struct TrueTypeFace {
    pub data: Vec<u8>,
    /// Advance widths for codes 32..=255, in thousandths of an em
    pub widths: Vec<u16>,
    pub ascent: f32,
    pub descent: f32,
    pub cap_height: f32,
    pub bbox: [f32; 4],
    pub italic: bool,
}

#[derive(Debug, Clone)]
pub enum FaceSource {
    Builtin(BuiltinFace),
    TrueType(TrueTypeFace),
}

/// A single face that can be drawn with.
#[derive(Debug, Clone)]
pub struct PhysicalFont {
    /// The name the face was registered under, e.g. `MySerif-Bold`
    pub name: String,
    pub source: FaceSource,
}

impl PhysicalFont {
    /// Advance width of a WinAnsi code, in thousandths of an em.
    pub fn width(&self, code: u8) -> f32 {
        match &self.source {
            FaceSource::Builtin(face) => face.width(code) as f32,
            FaceSource::TrueType(face) => code
                .checked_sub(32)
                .and_then(|i| face.widths.get(i as usize))
                .copied()
                .unwrap_or(0) as f32,
        }
    }
}

/// The variants registered for one logical family name.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FontFamily {
    pub normal: FontId,
    pub bold: Option<FontId>,
    pub italic: Option<FontId>,
    pub bold_italic: Option<FontId>,
}

impl FontFamily {
    fn variant(&self, bold: bool, italic: bool) -> Option<FontId> {
        match (bold, italic) {
            (false, false) => Some(self.normal),
            (true, false) => self.bold,
            (false, true) => self.italic,
            (true, true) => self.bold_italic,
        }
    }
}

/// Font files for a family, relative to the registry's fonts directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FontFiles {
    pub normal: Option<String>,
    pub bold: Option<String>,
    pub italic: Option<String>,
    pub bold_italic: Option<String>,
}

pub struct FontRegistry {
    fonts_dir: PathBuf,
    faces: Vec<PhysicalFont>,
    families: HashMap<String, FontFamily>,
    /// Every registration name ever attempted, and whether it worked
    registered: HashMap<String, Option<FontId>>,
    default_family: FontFamily,
    warned: RefCell<HashSet<String>>,
}

impl FontRegistry {
    /// Creates a registry that knows the built-in Helvetica, Times and Courier families
    /// and loads TrueType files from `fonts_dir`.
    pub fn new<P: Into<PathBuf>>(fonts_dir: P) -> FontRegistry {
        let mut faces = Vec::new();
        let mut families = HashMap::new();
        let mut registered = HashMap::new();

        for family in BuiltinFamily::all() {
            let mut ids = [FontId(0); 4];
            for (i, (bold, italic)) in [(false, false), (true, false), (false, true), (true, true)]
                .into_iter()
                .enumerate()
            {
                let face = BuiltinFace {
                    family: *family,
                    bold,
                    italic,
                };
                let id = FontId(faces.len());
                registered.insert(face.base_font().to_string(), Some(id));
                faces.push(PhysicalFont {
                    name: face.base_font().to_string(),
                    source: FaceSource::Builtin(face),
                });
                ids[i] = id;
            }
            families.insert(
                family.name().to_string(),
                FontFamily {
                    normal: ids[0],
                    bold: Some(ids[1]),
                    italic: Some(ids[2]),
                    bold_italic: Some(ids[3]),
                },
            );
        }

        // Helvetica is registered first
        let default_family = FontFamily {
            normal: FontId(0),
            bold: Some(FontId(1)),
            italic: Some(FontId(2)),
            bold_italic: Some(FontId(3)),
        };

        FontRegistry {
            fonts_dir: fonts_dir.into(),
            faces,
            families,
            registered,
            default_family,
            warned: RefCell::new(HashSet::new()),
        }
    }

    /// Registers a single TrueType file under `registration_name`.
    ///
    /// Registration is idempotent: a name that was already attempted returns the earlier
    /// outcome without touching the disk again, whether that outcome was a success or not.
    pub fn register_font(&mut self, registration_name: &str, file: &str) -> Option<FontId> {
        if let Some(outcome) = self.registered.get(registration_name) {
            log::debug!("Font `{registration_name}` was previously processed");
            return *outcome;
        }

        let path = self.font_path(file);
        let outcome = match load_truetype(&path) {
            Ok(face) => {
                let id = FontId(self.faces.len());
                log::info!("Registered font `{registration_name}` from {}", path.display());
                self.faces.push(PhysicalFont {
                    name: registration_name.to_string(),
                    source: FaceSource::TrueType(face),
                });
                Some(id)
            }
            Err(e) => {
                log::warn!("Could not register font `{registration_name}`: {e:#}");
                None
            }
        };
        self.registered.insert(registration_name.to_string(), outcome);
        outcome
    }

    /// Registers a logical family from its variant files. The family only becomes
    /// available when its normal variant loads; missing variants fall back at lookup.
    pub fn register_family(&mut self, logical: &str, files: &FontFiles) -> bool {
        if self.families.contains_key(logical) {
            log::debug!("Font family `{logical}` is already registered");
            return true;
        }

        // a family defined as just a standard font name is an alias
        if let Some(face) = files.normal.as_deref().and_then(BuiltinFace::parse) {
            if files.bold.is_none() && files.italic.is_none() && files.bold_italic.is_none() {
                if let Some(family) = self.families.get(face.family.name()).copied() {
                    let family = if face.bold || face.italic {
                        let id = family.variant(face.bold, face.italic).unwrap_or(family.normal);
                        FontFamily {
                            normal: id,
                            bold: family.bold,
                            italic: family.italic,
                            bold_italic: family.bold_italic,
                        }
                    } else {
                        family
                    };
                    self.families.insert(logical.to_string(), family);
                    return true;
                }
            }
        }

        let Some(normal) = files
            .normal
            .as_deref()
            .and_then(|file| self.register_font(logical, file))
        else {
            log::warn!("Could not register the normal variant of `{logical}`, skipping the family");
            return false;
        };

        let bold = files
            .bold
            .as_deref()
            .and_then(|file| self.register_font(&format!("{logical}-Bold"), file));
        let italic = files
            .italic
            .as_deref()
            .and_then(|file| self.register_font(&format!("{logical}-Italic"), file));
        let bold_italic = files
            .bold_italic
            .as_deref()
            .and_then(|file| self.register_font(&format!("{logical}-BoldItalic"), file));

        self.families.insert(
            logical.to_string(),
            FontFamily {
                normal,
                bold,
                italic,
                bold_italic,
            },
        );
        true
    }

    /// Resolves a logical font and variant to a physical face. Never fails: the chain is
    /// exact variant, then the family's normal face, then the default family.
    pub fn resolve(&self, logical: &str, bold: bool, italic: bool) -> FontId {
        if let Some(family) = self.families.get(logical) {
            return self.pick(logical, family, bold, italic);
        }

        if let Some(face) = BuiltinFace::parse(logical) {
            if let Some(family) = self.families.get(face.family.name()) {
                return self.pick(logical, family, bold || face.bold, italic || face.italic);
            }
        }

        self.note_fallback(
            format!("family:{logical}"),
            format!("Font `{logical}` is not registered, using {DEFAULT_FAMILY}"),
        );
        let family = self.default_family;
        self.pick(DEFAULT_FAMILY, &family, bold, italic)
    }

    fn pick(&self, logical: &str, family: &FontFamily, bold: bool, italic: bool) -> FontId {
        family.variant(bold, italic).unwrap_or_else(|| {
            self.note_fallback(
                format!("variant:{logical}:{bold}:{italic}"),
                format!(
                    "Font `{logical}` has no {} variant, using its normal face",
                    variant_name(bold, italic)
                ),
            );
            family.normal
        })
    }

    fn note_fallback(&self, key: String, message: String) {
        if self.warned.borrow_mut().insert(key) {
            log::warn!("{message}");
        } else {
            log::debug!("{message}");
        }
    }

    pub fn face(&self, id: FontId) -> Option<&PhysicalFont> {
        self.faces.get(id.0)
    }

    /// Width of `text` set in `id` at `size` points.
    pub fn text_width(&self, id: FontId, text: &str, size: f32) -> f32 {
        let Some(face) = self.face(id) else {
            return 0.0;
        };
        encode_text(text)
            .into_iter()
            .map(|code| face.width(code))
            .sum::<f32>()
            * size
            / 1000.0
    }

    fn font_path(&self, file: &str) -> PathBuf {
        let path = self.fonts_dir.join(file);
        if path.extension().is_none() {
            path.with_extension("ttf")
        } else {
            path
        }
    }
}

fn variant_name(bold: bool, italic: bool) -> &'static str {
    match (bold, italic) {
        (false, false) => "normal",
        (true, false) => "bold",
        (false, true) => "italic",
        (true, true) => "bold italic",
    }
}

fn load_truetype(path: &Path) -> Result<TrueTypeFace> {
    if !path.is_file() {
        return Err(anyhow!("Font file not found: {}", path.display()));
    }
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read font file: {}", path.display()))?;
    let face = Face::parse(&data, 0)
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("Failed to parse font file: {}", path.display()))?;

    let scale = 1000.0 / face.units_per_em() as f32;
    let fallback_advance = face.glyph_hor_advance(GlyphId(0)).unwrap_or(0);
    let widths = (32..=255u8)
        .map(|code| {
            let advance = win_ansi_decode(code)
                .and_then(|ch| face.glyph_index(ch))
                .and_then(|gid| face.glyph_hor_advance(gid))
                .unwrap_or(fallback_advance);
            (advance as f32 * scale).round() as u16
        })
        .collect();
    let bbox = face.global_bounding_box();

    let ttf = TrueTypeFace {
        widths,
        ascent: face.ascender() as f32 * scale,
        descent: face.descender() as f32 * scale,
        cap_height: face
            .capital_height()
            .map(|h| h as f32 * scale)
            .unwrap_or(face.ascender() as f32 * scale),
        bbox: [
            bbox.x_min as f32 * scale,
            bbox.y_min as f32 * scale,
            bbox.x_max as f32 * scale,
            bbox.y_max as f32 * scale,
        ],
        italic: face.is_italic(),
        data: Vec::new(),
    };
    Ok(TrueTypeFace { data, ..ttf })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn base_font(registry: &FontRegistry, id: FontId) -> String {
        registry.face(id).expect("face exists").name.clone()
    }

    #[test]
    fn can_resolve_builtin_variants() {
        let registry = FontRegistry::new("fonts");
        let id = registry.resolve("Times", true, true);
        assert_eq!(base_font(&registry, id), "Times-BoldItalic");
        let id = registry.resolve("Helvetica-Bold", false, true);
        assert_eq!(base_font(&registry, id), "Helvetica-BoldOblique");
        let id = registry.resolve("Times-Roman", false, false);
        assert_eq!(base_font(&registry, id), "Times-Roman");
    }

    #[test]
    fn unknown_families_fall_back_to_default() {
        let registry = FontRegistry::new("fonts");
        let id = registry.resolve("NoSuchFont", false, false);
        assert_eq!(base_font(&registry, id), "Helvetica");
        let id = registry.resolve("NoSuchFont", true, false);
        assert_eq!(base_font(&registry, id), "Helvetica-Bold");
    }

    #[test]
    fn failed_registrations_are_remembered() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let mut registry = FontRegistry::new(dir.path());
        assert_eq!(registry.register_font("Missing", "Missing.ttf"), None);
        std::fs::write(dir.path().join("Missing.ttf"), b"not a font").expect("can write file");
        // the second attempt doesn't look at the disk again
        assert_eq!(registry.register_font("Missing", "Missing.ttf"), None);
        assert_eq!(registry.registered.get("Missing"), Some(&None));
    }

    #[test]
    fn garbage_font_files_are_rejected() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        std::fs::write(dir.path().join("Broken.ttf"), b"not a font").expect("can write file");
        let mut registry = FontRegistry::new(dir.path());
        let files = FontFiles {
            normal: Some("Broken.ttf".to_string()),
            ..Default::default()
        };
        assert!(!registry.register_family("Broken", &files));
        assert!(!registry.families.contains_key("Broken"));
        let id = registry.resolve("Broken", false, false);
        assert_eq!(base_font(&registry, id), "Helvetica");
    }

    #[test]
    fn can_alias_standard_fonts() {
        let mut registry = FontRegistry::new("fonts");
        let files = FontFiles {
            normal: Some("Times-Roman".to_string()),
            ..Default::default()
        };
        assert!(registry.register_family("body", &files));
        let id = registry.resolve("body", true, false);
        assert_eq!(base_font(&registry, id), "Times-Bold");
        // registering again returns the same face
        assert!(registry.register_family("body", &files));
        assert_eq!(registry.resolve("body", true, false), id);
    }

    #[test]
    fn can_measure_text() {
        let registry = FontRegistry::new("fonts");
        let courier = registry.resolve("Courier", false, false);
        assert!((registry.text_width(courier, "abcd", 10.0) - 24.0).abs() < 0.001);
        let helvetica = registry.resolve("Helvetica", false, false);
        assert!(
            registry.text_width(helvetica, "iiii", 10.0)
                < registry.text_width(helvetica, "MMMM", 10.0)
        );
    }

    const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

    #[test]
    fn can_register_truetype_fonts() {
        let mut registry = FontRegistry::new(FIXTURES);
        let id = registry
            .register_font("Montserrat", "Montserrat-Regular.ttf")
            .expect("font registers");
        assert_eq!(registry.register_font("Montserrat", "Montserrat-Regular.ttf"), Some(id));

        let face = registry.face(id).expect("face exists");
        let FaceSource::TrueType(ttf) = &face.source else {
            panic!("expected a TrueType face");
        };
        assert!(!ttf.data.is_empty());
        assert_eq!(ttf.widths.len(), 224);
        assert!(ttf.ascent > 0.0 && ttf.descent < 0.0);
        assert!(!ttf.italic);
        assert!(registry.text_width(id, "MMMM", 10.0) > registry.text_width(id, "iiii", 10.0));
    }

    #[test]
    fn missing_truetype_variants_fall_back_to_normal() {
        let mut registry = FontRegistry::new(FIXTURES);
        let files = FontFiles {
            normal: Some("Montserrat-Regular".to_string()),
            ..Default::default()
        };
        assert!(registry.register_family("Sans", &files));
        let normal = registry.resolve("Sans", false, false);
        assert_eq!(base_font(&registry, normal), "Sans");
        assert_eq!(registry.resolve("Sans", true, false), normal);
        assert_eq!(registry.resolve("Sans", true, true), normal);
    }

    proptest! {
        #[test]
        fn resolution_is_total(name in ".{0,24}", bold: bool, italic: bool) {
            let registry = FontRegistry::new("fonts");
            let id = registry.resolve(&name, bold, italic);
            prop_assert!(registry.face(id).is_some());
        }
    }
}
