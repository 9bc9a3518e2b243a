//! Two-pass rendering of one part of a book into a sealed PDF.
//!
//! Rendering moves through three states, each its own type so they can't be run out
//! of order:
//! - [`Composing`] lays flow items onto pages, keeping every page open and recording
//!   where each heading lands
//! - [`Finalizing`] walks the finished pages again to draw page numbers, which need
//!   the total page count
//! - [`SealedDocument`] is the serialized output; the page states are gone by then

mod composer;
pub use composer::*;

mod images;
mod layout;
mod page;

mod page_numbers;
pub use page_numbers::*;

mod pdf_writer;
pub use pdf_writer::*;

mod table_of_contents;
pub use table_of_contents::*;

mod title_page;
pub use title_page::*;

use crate::flow::{ChapterFlow, FlowItem};
use crate::style::fonts::FontRegistry;
use crate::style::ResolvedStyle;
use anyhow::{Context, Result};

/// One part of a book, ready to render.
#[derive(Clone, Debug)]
pub struct PartContent<'a> {
    pub title: &'a str,
    pub author: Option<&'a str>,
    /// Part number and part count, when the book is split
    pub part: Option<(usize, usize)>,
    pub chapters: Vec<&'a ChapterFlow>,
}

impl PartContent<'_> {
    fn toc_marks(&self) -> usize {
        self.chapters
            .iter()
            .flat_map(|c| &c.items)
            .map(|item| item.toc_marks().len())
            .sum()
    }
}

/// What happened while rendering a document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderReport {
    pub page_count: usize,
    pub toc: Vec<TocEntry>,
    /// Blocks that were replaced by an error marker
    pub error_markers: usize,
    /// 0-based indices of pages whose number could not be drawn
    pub unnumbered_pages: Vec<usize>,
}

/// A finished document.
#[derive(Clone, Debug)]
pub struct SealedDocument {
    pub bytes: Vec<u8>,
    pub report: RenderReport,
}

/// The first pass: flow items are composed onto pages.
pub struct Composing<'a> {
    composer: Composer<'a>,
    toc: Option<TocReservation>,
    info: DocumentInfo,
}

impl<'a> Composing<'a> {
    /// Opens a document with its title page and the pages the TOC will need.
    pub fn begin(
        style: &'a ResolvedStyle,
        fonts: &'a FontRegistry,
        content: &PartContent,
    ) -> Composing<'a> {
        let mut composer = Composer::new(style, fonts);

        if style.title_page.show {
            render_title_page(
                &mut composer,
                &TitleInfo {
                    title: content.title,
                    author: content.author,
                    part: content.part,
                },
            );
        }

        let marks = content.toc_marks();
        let toc = (style.toc.show && marks > 0).then(|| {
            let pages = pages_needed(style, fonts, marks);
            log::debug!("Reserving {pages} pages for {marks} table of contents entries");
            TocReservation {
                first_page: composer.reserve_pages(pages),
                pages,
            }
        });

        let subject = match content.part {
            Some((number, total)) => Some(format!("Part {number} of {total}")),
            None => None,
        };
        Composing {
            composer,
            toc,
            info: DocumentInfo {
                title: content.title.to_string(),
                author: content.author.map(str::to_string),
                subject,
            },
        }
    }

    pub fn push(&mut self, item: &FlowItem) {
        self.composer.push(item);
    }

    /// Ends composition and fills in the table of contents.
    pub fn finish(self) -> Finalizing<'a> {
        let style = self.composer.style();
        let fonts = self.composer.fonts();
        let mut composed = self.composer.finish();
        if let Some(reservation) = self.toc {
            populate(&mut composed.pages, reservation, &composed.toc, style, fonts);
        }
        Finalizing {
            style,
            fonts,
            composed,
            info: self.info,
        }
    }
}

/// The second pass: the page count is known, so pages can be numbered.
pub struct Finalizing<'a> {
    style: &'a ResolvedStyle,
    fonts: &'a FontRegistry,
    composed: Composed,
    info: DocumentInfo,
}

impl Finalizing<'_> {
    #[cfg(test)]
    fn pages(&self) -> &[page::PageState] {
        &self.composed.pages
    }

    pub fn finalize(self) -> Result<SealedDocument> {
        let Finalizing {
            style,
            fonts,
            mut composed,
            info,
        } = self;

        let unnumbered_pages = number_pages(&mut composed.pages, style, fonts);
        let bytes = write_pdf(&composed.pages, fonts, &composed.images, &composed.toc, &info)
            .with_context(|| format!("Failed to write `{}`", info.title))?;

        Ok(SealedDocument {
            bytes,
            report: RenderReport {
                page_count: composed.pages.len(),
                toc: composed.toc,
                error_markers: composed.error_markers,
                unnumbered_pages,
            },
        })
    }
}

/// Renders parts of a book with one resolved style.
pub struct TwoPassRenderer<'a> {
    style: &'a ResolvedStyle,
    fonts: &'a FontRegistry,
}

impl<'a> TwoPassRenderer<'a> {
    pub fn new(style: &'a ResolvedStyle, fonts: &'a FontRegistry) -> TwoPassRenderer<'a> {
        TwoPassRenderer { style, fonts }
    }

    pub fn render(&self, content: &PartContent) -> Result<SealedDocument> {
        let mut composing = Composing::begin(self.style, self.fonts, content);
        for chapter in &content.chapters {
            log::debug!(
                "Composing chapter {} (`{}`) from page {}",
                chapter.number,
                chapter.source_id,
                composing.composer.page_index() + 1
            );
            for item in &chapter.items {
                composing.push(item);
            }
        }

        let sealed = composing.finish().finalize()?;
        log::info!(
            "Rendered `{}`{}: {} pages",
            content.title,
            content
                .part
                .map(|(n, total)| format!(" part {n} of {total}"))
                .unwrap_or_default(),
            sealed.report.page_count
        );
        Ok(sealed)
    }
}
