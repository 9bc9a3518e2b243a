//! Serializes finished pages into a PDF with lopdf.

use crate::render::composer::TocEntry;
use crate::render::images::{ImageId, ImageStore};
use crate::render::page::{DrawOp, PageState};
use crate::style::fonts::{FaceSource, FontId, FontRegistry, PhysicalFont, TrueTypeFace};
use crate::style::metrics::encode_text;
use crate::style::{Colour, RuleKind};
use anyhow::{anyhow, Context, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;
use std::io::Write;

/// Document-level metadata written to the Info dictionary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentInfo {
    pub title: String,
    pub author: Option<String>,
    pub subject: Option<String>,
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// A PDF text string: UTF-16BE with a byte order mark, so any title survives.
fn text_string(text: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn colour(c: Colour) -> Vec<Object> {
    vec![c.r.into(), c.g.into(), c.b.into()]
}

fn font_resource(id: FontId) -> String {
    format!("F{}", id.index())
}

fn image_resource(id: ImageId, names: &BTreeMap<ImageId, (String, ObjectId)>) -> Option<Vec<u8>> {
    names.get(&id).map(|(name, _)| name.clone().into_bytes())
}

/// PDF names can't carry spaces or delimiters.
fn pdf_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '+' { c } else { '_' })
        .collect()
}

fn embed_truetype(doc: &mut Document, name: &str, face: &TrueTypeFace) -> Result<ObjectId> {
    let file = Stream::new(
        dictionary! {
            "Length1" => face.data.len() as i64,
            "Filter" => "FlateDecode",
        },
        deflate(&face.data).with_context(|| format!("Failed to compress font `{name}`"))?,
    );
    let file_id = doc.add_object(file);

    let flags: i64 = if face.italic { 32 + 64 } else { 32 };
    let descriptor = dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(name.as_bytes().to_vec()),
        "Flags" => flags,
        "FontBBox" => face.bbox.iter().map(|v| Object::Real(*v)).collect::<Vec<Object>>(),
        "ItalicAngle" => if face.italic { -12i64 } else { 0 },
        "Ascent" => face.ascent,
        "Descent" => face.descent,
        "CapHeight" => face.cap_height,
        "StemV" => 80i64,
        "FontFile2" => file_id,
    };
    let descriptor_id = doc.add_object(descriptor);

    let widths: Vec<Object> = face.widths.iter().map(|w| Object::Integer(*w as i64)).collect();
    Ok(doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => Object::Name(name.as_bytes().to_vec()),
        "FirstChar" => 32i64,
        "LastChar" => 32 + widths.len() as i64 - 1,
        "Widths" => widths,
        "FontDescriptor" => descriptor_id,
        "Encoding" => "WinAnsiEncoding",
    }))
}

fn embed_font(doc: &mut Document, font: &PhysicalFont) -> Result<ObjectId> {
    match &font.source {
        FaceSource::Builtin(face) => Ok(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => face.base_font(),
            "Encoding" => "WinAnsiEncoding",
        })),
        FaceSource::TrueType(face) => embed_truetype(doc, &pdf_name(&font.name), face),
    }
}

fn embed_image(doc: &mut Document, images: &ImageStore, id: ImageId) -> Result<ObjectId> {
    let image = images
        .get(id)
        .ok_or_else(|| anyhow!("Image {id:?} is not loaded"))?;
    let data = deflate(&image.rgb)
        .with_context(|| format!("Failed to compress image {}", image.path.display()))?;
    Ok(doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "Filter" => "FlateDecode",
        },
        data,
    )))
}

fn page_content(
    page: &PageState,
    images: &BTreeMap<ImageId, (String, ObjectId)>,
) -> Result<Vec<u8>> {
    let mut ops = Vec::new();
    for op in &page.ops {
        match op {
            DrawOp::Text {
                x,
                y,
                font,
                size,
                colour: c,
                text,
                word_spacing,
            } => {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new(
                    "Tf",
                    vec![Object::Name(font_resource(*font).into_bytes()), (*size).into()],
                ));
                ops.push(Operation::new("rg", colour(*c)));
                ops.push(Operation::new("Tw", vec![(*word_spacing).into()]));
                ops.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::String(encode_text(text), StringFormat::Hexadecimal)],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
            DrawOp::Line {
                from,
                to,
                width,
                colour: c,
                kind,
            } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new("w", vec![(*width).into()]));
                ops.push(Operation::new("RG", colour(*c)));
                let (cap, dash): (i64, Vec<Object>) = match kind {
                    RuleKind::Solid => (0, vec![]),
                    RuleKind::Dashed => (0, vec![(width * 3.0).into(), (width * 2.0).into()]),
                    RuleKind::Dotted => (1, vec![0.into(), (width * 2.0).into()]),
                };
                ops.push(Operation::new("J", vec![cap.into()]));
                ops.push(Operation::new("d", vec![dash.into(), 0.into()]));
                ops.push(Operation::new("m", vec![from.0.into(), from.1.into()]));
                ops.push(Operation::new("l", vec![to.0.into(), to.1.into()]));
                ops.push(Operation::new("S", vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
            DrawOp::Rect {
                x,
                y,
                width,
                height,
                fill,
            } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new("rg", colour(*fill)));
                ops.push(Operation::new(
                    "re",
                    vec![(*x).into(), (*y).into(), (*width).into(), (*height).into()],
                ));
                ops.push(Operation::new("f", vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
            DrawOp::Image {
                image,
                x,
                y,
                width,
                height,
            } => {
                let Some(name) = image_resource(*image, images) else {
                    continue;
                };
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        (*width).into(),
                        0.into(),
                        0.into(),
                        (*height).into(),
                        (*x).into(),
                        (*y).into(),
                    ],
                ));
                ops.push(Operation::new("Do", vec![Object::Name(name)]));
                ops.push(Operation::new("Q", vec![]));
            }
            DrawOp::Link { .. } => {}
        }
    }
    Content { operations: ops }
        .encode()
        .with_context(|| format!("Failed to encode page {}", page.index + 1))
}

struct OutlineNode {
    id: ObjectId,
    entry: usize,
    children: Vec<usize>,
    parent: Option<usize>,
}

/// Builds the bookmark tree from TOC entries, nesting by level.
fn build_outline(
    doc: &mut Document,
    entries: &[TocEntry],
    page_ids: &[ObjectId],
) -> Option<ObjectId> {
    let entries: Vec<&TocEntry> = entries
        .iter()
        .filter(|e| e.page >= 1 && e.page <= page_ids.len())
        .collect();
    if entries.is_empty() {
        return None;
    }

    let mut nodes: Vec<OutlineNode> = Vec::with_capacity(entries.len());
    let mut roots = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        while stack
            .last()
            .is_some_and(|&n| entries[nodes[n].entry].level >= entry.level)
        {
            stack.pop();
        }
        let parent = stack.last().copied();
        nodes.push(OutlineNode {
            id: doc.new_object_id(),
            entry: i,
            children: Vec::new(),
            parent,
        });
        match parent {
            Some(p) => nodes[p].children.push(i),
            None => roots.push(i),
        }
        stack.push(i);
    }

    let root_id = doc.new_object_id();
    for (i, node) in nodes.iter().enumerate() {
        let entry = entries[node.entry];
        let mut dict = dictionary! {
            "Title" => text_string(&entry.text),
            "Parent" => node.parent.map(|p| nodes[p].id).unwrap_or(root_id),
            "Dest" => vec![Object::Reference(page_ids[entry.page - 1]), "Fit".into()],
        };
        let around = match node.parent {
            Some(p) => &nodes[p].children,
            None => &roots,
        };
        if let Some(pos) = around.iter().position(|&s| s == i) {
            if pos > 0 {
                dict.set("Prev", nodes[around[pos - 1]].id);
            }
            if let Some(&next) = around.get(pos + 1) {
                dict.set("Next", nodes[next].id);
            }
        }
        if let (Some(&first), Some(&last)) = (node.children.first(), node.children.last()) {
            dict.set("First", nodes[first].id);
            dict.set("Last", nodes[last].id);
            // open, showing the direct children
            dict.set("Count", node.children.len() as i64);
        }
        doc.objects.insert(node.id, Object::Dictionary(dict));
    }

    let (first, last) = (roots[0], roots[roots.len() - 1]);
    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => nodes[first].id,
            "Last" => nodes[last].id,
            "Count" => roots.len() as i64,
        }),
    );
    Some(root_id)
}

/// Writes `pages` out as a complete PDF file.
pub fn write_pdf(
    pages: &[PageState],
    fonts: &FontRegistry,
    images: &ImageStore,
    outline: &[TocEntry],
    info: &DocumentInfo,
) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut used_fonts = BTreeMap::new();
    let mut used_images = BTreeMap::new();
    for op in pages.iter().flat_map(|p| &p.ops) {
        match op {
            DrawOp::Text { font, .. } if !used_fonts.contains_key(font) => {
                let face = fonts
                    .face(*font)
                    .ok_or_else(|| anyhow!("Font {font:?} is not registered"))?;
                used_fonts.insert(*font, embed_font(&mut doc, face)?);
            }
            DrawOp::Image { image, .. } if !used_images.contains_key(image) => {
                let id = embed_image(&mut doc, images, *image)?;
                used_images.insert(*image, (format!("Im{}", used_images.len() + 1), id));
            }
            _ => {}
        }
    }

    let mut font_dict = Dictionary::new();
    for (font, id) in &used_fonts {
        font_dict.set(font_resource(*font), *id);
    }
    let mut image_dict = Dictionary::new();
    for (name, id) in used_images.values() {
        image_dict.set(name.clone(), *id);
    }
    let resources_id = doc.add_object(dictionary! {
        "Font" => font_dict,
        "XObject" => image_dict,
    });

    let page_ids: Vec<ObjectId> = pages.iter().map(|_| doc.new_object_id()).collect();
    for (page, &page_id) in pages.iter().zip(&page_ids) {
        let content = deflate(&page_content(page, &used_images)?)?;
        let content_id =
            doc.add_object(Stream::new(dictionary! {"Filter" => "FlateDecode"}, content));

        let mut annotations = Vec::new();
        for op in &page.ops {
            let DrawOp::Link { rect, target } = op else {
                continue;
            };
            let Some(&target_id) = page_ids.get(*target) else {
                log::warn!("Link on page {} points past the end of the document", page.index + 1);
                continue;
            };
            let annotation = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Link",
                "Rect" => rect.iter().map(|v| Object::Real(*v)).collect::<Vec<Object>>(),
                "Border" => vec![0.into(), 0.into(), 0.into()],
                "Dest" => vec![Object::Reference(target_id), "Fit".into()],
            });
            annotations.push(Object::Reference(annotation));
        }

        let mut dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                page.geometry.width.into(),
                page.geometry.height.into(),
            ],
            "Contents" => content_id,
            "Resources" => resources_id,
        };
        if !annotations.is_empty() {
            dict.set("Annots", annotations);
        }
        doc.objects.insert(page_id, Object::Dictionary(dict));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<Object>>(),
            "Count" => page_ids.len() as i64,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if let Some(outline_id) = build_outline(&mut doc, outline, &page_ids) {
        catalog.set("Outlines", outline_id);
        catalog.set("PageMode", "UseOutlines");
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut info_dict = dictionary! {
        "Title" => text_string(&info.title),
        "Creator" => text_string(concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))),
        "Producer" => text_string("lopdf"),
        "CreationDate" => Object::string_literal(
            chrono::Local::now().format("D:%Y%m%d%H%M%S").to_string()
        ),
    };
    if let Some(author) = &info.author {
        info_dict.set("Author", text_string(author));
    }
    if let Some(subject) = &info.subject {
        info_dict.set("Subject", text_string(subject));
    }
    let info_id = doc.add_object(info_dict);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).context("Failed to serialize PDF")?;
    log::debug!(
        "Serialized {} pages, {} fonts, {} images into {} bytes",
        pages.len(),
        used_fonts.len(),
        used_images.len(),
        bytes.len()
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::PageGeometry;

    fn page(index: usize, fonts: &FontRegistry, text: &str) -> PageState {
        let mut page = PageState::new(
            index,
            PageGeometry {
                width: 300.0,
                height: 400.0,
            },
        );
        page.ops.push(DrawOp::Text {
            x: 20.0,
            y: 300.0,
            font: fonts.resolve("Times", true, false),
            size: 12.0,
            colour: crate::style::colour::BLACK,
            text: text.to_string(),
            word_spacing: 0.0,
        });
        page
    }

    #[test]
    fn can_write_a_loadable_pdf() {
        let fonts = FontRegistry::new("fonts");
        let mut pages = vec![page(0, &fonts, "Contents"), page(1, &fonts, "Chapter one")];
        pages[0].ops.push(DrawOp::Link {
            rect: [0.0, 0.0, 100.0, 20.0],
            target: 1,
        });
        pages[1].ops.push(DrawOp::Line {
            from: (10.0, 10.0),
            to: (200.0, 10.0),
            width: 1.0,
            colour: crate::style::colour::BLACK,
            kind: RuleKind::Dotted,
        });
        let outline = vec![
            TocEntry {
                level: 0,
                text: "One".to_string(),
                page: 2,
            },
            TocEntry {
                level: 1,
                text: "One point one".to_string(),
                page: 2,
            },
        ];
        let info = DocumentInfo {
            title: "Tëst".to_string(),
            author: Some("Someone".to_string()),
            subject: None,
        };

        let bytes = write_pdf(&pages, &fonts, &ImageStore::default(), &outline, &info)
            .expect("pdf is written");
        assert!(bytes.starts_with(b"%PDF-1.7"));

        let doc = Document::load_mem(&bytes).expect("pdf loads");
        assert_eq!(doc.get_pages().len(), 2);
        let catalog = doc.catalog().expect("has a catalog");
        assert!(catalog.get(b"Outlines").is_ok());
    }

    #[test]
    fn embeds_truetype_fonts() {
        let mut fonts = FontRegistry::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"));
        let id = fonts
            .register_font("Montserrat", "Montserrat-Regular.ttf")
            .expect("font registers");
        let mut pages = vec![page(0, &fonts, "Built-in")];
        pages[0].ops.push(DrawOp::Text {
            x: 20.0,
            y: 200.0,
            font: id,
            size: 12.0,
            colour: crate::style::colour::BLACK,
            text: "Embedded".to_string(),
            word_spacing: 0.0,
        });
        let info = DocumentInfo {
            title: "Fonts".to_string(),
            author: None,
            subject: None,
        };

        let bytes = write_pdf(&pages, &fonts, &ImageStore::default(), &[], &info)
            .expect("pdf is written");
        let doc = Document::load_mem(&bytes).expect("pdf loads");
        let descriptor = doc
            .objects
            .values()
            .filter_map(|o| o.as_dict().ok())
            .find(|d| d.has(b"FontFile2"))
            .expect("has an embedded font descriptor");
        assert_eq!(
            descriptor.get(b"FontName").and_then(Object::as_name).expect("has a name"),
            b"Montserrat"
        );
        let file_id = descriptor
            .get(b"FontFile2")
            .and_then(Object::as_reference)
            .expect("font file is a reference");
        let stream = doc
            .get_object(file_id)
            .and_then(Object::as_stream)
            .expect("font file is a stream");
        let data = stream.decompressed_content().expect("font file decompresses");
        assert_eq!(data.len(), 330941);
    }

    #[test]
    fn can_encode_text_strings() {
        let Object::String(bytes, _) = text_string("Aé") else {
            panic!("expected a string");
        };
        assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]);
        assert_eq!(pdf_name("My Serif-Bold"), "My_Serif-Bold");
    }
}
