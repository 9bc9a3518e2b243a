//! Runs the whole pipeline once per requested page size: scale the style, estimate
//! and partition the chapters, then render and write every part.

use crate::flow::{ChapterFlow, CodeHighlighter, ContentAdapter};
use crate::pagination::{partition, Part};
use crate::render::{PartContent, RenderReport, TwoPassRenderer};
use crate::source::Document;
use crate::style::resolver::check_margins;
use crate::style::{PageSize, ResolvedStyle, StyleResolver};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Everything needed to render a book in one or more page sizes.
pub struct FormatJob<'a> {
    pub document: &'a Document,
    pub resolver: &'a StyleResolver,
    pub style: &'a ResolvedStyle,
    pub highlighter: &'a CodeHighlighter,
    /// Page sizes to render; empty means the style's own size
    pub formats: Vec<PageSize>,
    pub max_pages_per_part: Option<u32>,
    pub images_dir: PathBuf,
    pub output_dir: PathBuf,
    pub base_name: String,
}

impl FormatJob<'_> {
    fn formats(&self) -> Vec<PageSize> {
        if self.formats.is_empty() {
            vec![self.style.page_size]
        } else {
            self.formats.clone()
        }
    }
}

/// The plan for one page size: its scaled style, chapters and parts.
pub struct FormatPlan {
    pub format: PageSize,
    pub style: ResolvedStyle,
    pub chapters: Vec<ChapterFlow>,
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug)]
pub struct RenderedPart {
    pub number: usize,
    pub path: PathBuf,
    /// Display numbers of the chapters in this part
    pub chapters: Vec<usize>,
    pub report: RenderReport,
}

#[derive(Clone, Debug)]
pub struct FormatOutput {
    pub format: PageSize,
    pub parts: Vec<RenderedPart>,
    /// Numbers of parts that could not be written
    pub failed_parts: Vec<usize>,
}

/// Base names keep letters, digits, spaces, `-` and `_`.
pub fn sanitize_base_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "book".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `{base}[_part{N}][_{FORMAT}].pdf`
pub fn output_file_name(base: &str, part: Option<usize>, format: Option<&PageSize>) -> String {
    let mut name = sanitize_base_name(base);
    if let Some(part) = part {
        name.push_str(&format!("_part{part}"));
    }
    if let Some(format) = format {
        name.push_str(&format!("_{}", format.label()));
    }
    name.push_str(".pdf");
    name
}

/// Writes `bytes` to a `.partial` sibling and renames it into place, so a failed
/// write never leaves a truncated file under the final name.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&partial)
            .with_context(|| format!("Failed to create {}", partial.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to flush {}", partial.display()))?;
        drop(file);
        fs::rename(&partial, path)
            .with_context(|| format!("Failed to move output into {}", path.display()))
    })();

    if result.is_err() && partial.exists() {
        if let Err(e) = fs::remove_file(&partial) {
            log::warn!("Failed to remove {}: {e}", partial.display());
        }
    }
    result
}

/// Scales the style to each page size and partitions the book for it.
pub fn plan_formats(job: &FormatJob) -> Result<Vec<FormatPlan>> {
    if job.document.chapters.is_empty() {
        return Err(anyhow!("`{}` has no chapters to render", job.document.title));
    }

    job.formats()
        .into_iter()
        .map(|format| {
            let style = if format == job.style.page_size {
                job.style.clone()
            } else {
                log::info!("Scaling style `{}` to {format}", job.style.name);
                StyleResolver::scale_for(job.style, format)
            };
            check_margins(style.geometry, &style.margins)
                .with_context(|| format!("Cannot render the {format} format"))?;
            let chapters = ContentAdapter::new(&style, job.highlighter, &job.images_dir)
                .chapters(job.document);
            let parts = partition(&chapters, &style, job.max_pages_per_part);
            log::info!("{format}: {} chapters in {} parts", chapters.len(), parts.len());
            Ok(FormatPlan {
                format,
                style,
                chapters,
                parts,
            })
        })
        .collect()
}

/// Renders and writes every part of one plan. A part that fails is logged and
/// skipped; the others are still written.
pub fn render_format(
    job: &FormatJob,
    plan: &FormatPlan,
    multiple_formats: bool,
    on_part: &mut dyn FnMut(&RenderedPart),
) -> FormatOutput {
    let renderer = TwoPassRenderer::new(&plan.style, job.resolver.fonts());
    let total = plan.parts.len();
    let mut output = FormatOutput {
        format: plan.format,
        parts: Vec::new(),
        failed_parts: Vec::new(),
    };

    for part in &plan.parts {
        let name = output_file_name(
            &job.base_name,
            (total > 1).then_some(part.number),
            multiple_formats.then_some(&plan.format),
        );
        let path = job.output_dir.join(name);
        let content = PartContent {
            title: &job.document.title,
            author: job.document.author.as_deref(),
            part: (total > 1).then_some((part.number, total)),
            chapters: part.chapters.iter().map(|&i| &plan.chapters[i]).collect(),
        };

        let written = renderer.render(&content).and_then(|sealed| {
            write_output(&path, &sealed.bytes)?;
            Ok(sealed.report)
        });
        match written {
            Ok(report) => {
                let rendered = RenderedPart {
                    number: part.number,
                    path,
                    chapters: content.chapters.iter().map(|c| c.number).collect(),
                    report,
                };
                on_part(&rendered);
                output.parts.push(rendered);
            }
            Err(e) => {
                log::error!("Part {} of {} ({}) failed: {e:#}", part.number, total, plan.format);
                output.failed_parts.push(part.number);
            }
        }
    }
    output
}

/// Renders every plan into the output directory, one file per part and page size.
pub fn render_formats(
    job: &FormatJob,
    plans: &[FormatPlan],
    on_part: &mut dyn FnMut(&RenderedPart),
) -> Result<Vec<FormatOutput>> {
    fs::create_dir_all(&job.output_dir)
        .with_context(|| format!("Failed to create {}", job.output_dir.display()))?;
    let multiple = plans.len() > 1;
    let mut outputs = Vec::with_capacity(plans.len());
    for plan in plans {
        outputs.push(render_format(job, plan, multiple, on_part));
    }
    Ok(outputs)
}
