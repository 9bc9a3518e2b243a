//! The composing pass: places flow items into page frames, recording TOC entries as
//! headings are committed to pages.

use crate::flow::{CodeListing, FlowItem, ImageBlock, Inline, Paragraph, TableBlock, TocMark};
use crate::render::images::{ImageId, ImageStore};
use crate::render::layout::{break_code_line, break_lines, pieces, Line};
use crate::render::page::{DrawOp, PageState};
use crate::style::fonts::FontRegistry;
use crate::style::resolver::TableStyle;
use crate::style::{Alignment, Colour, Divider, Frame, ResolvedStyle, RuleKind, TextStyle};
use anyhow::{anyhow, Result};
use std::collections::HashSet;

/// Lines of body text a heading insists on keeping beside it.
pub const KEEP_WITH_NEXT_LINES: f32 = 2.0;
const GRID_WIDTH: f32 = 0.5;
const EPSILON: f32 = 0.01;

/// A heading as committed to a page.
#[derive(Clone, Debug, PartialEq)]
pub struct TocEntry {
    pub level: u8,
    pub text: String,
    /// 1-based page in the output document
    pub page: usize,
}

/// Distance from the top of a line box to its baseline.
pub fn baseline_offset(style: &TextStyle) -> f32 {
    (style.leading - style.size).max(0.0) / 2.0 + style.size * 0.8
}

/// Draws one laid-out line with its top edge at `top`.
pub fn draw_line(
    page: &mut PageState,
    line: &Line,
    style: &TextStyle,
    alignment: Alignment,
    left: f32,
    width: f32,
    top: f32,
) {
    let baseline = top - baseline_offset(style);
    let slack = width - line.width;
    let x0 = match alignment {
        Alignment::Left | Alignment::Justified => left,
        Alignment::Center => left + slack / 2.0,
        Alignment::Right => left + slack,
    };
    let spaces = line.space_count();
    let word_spacing = if alignment == Alignment::Justified && !line.last && spaces > 0 {
        (slack / spaces as f32).max(0.0)
    } else {
        0.0
    };

    let mut x = x0;
    for fragment in &line.fragments {
        page.ops.push(DrawOp::Text {
            x,
            y: baseline,
            font: fragment.font,
            size: fragment.size,
            colour: fragment.colour,
            text: fragment.text.clone(),
            word_spacing,
        });
        x += fragment.width + word_spacing * fragment.text.matches(' ').count() as f32;
    }
}

fn unjustified(alignment: Alignment) -> Alignment {
    match alignment {
        Alignment::Justified => Alignment::Left,
        other => other,
    }
}

struct RowLayout {
    cells: Vec<Vec<Line>>,
    height: f32,
}

struct TableLayout {
    header: Option<RowLayout>,
    rows: Vec<RowLayout>,
    columns: usize,
    column_width: f32,
    inner_width: f32,
}

/// Everything the composing pass produced, with pages still open for editing.
pub struct Composed {
    pub pages: Vec<PageState>,
    pub images: ImageStore,
    pub toc: Vec<TocEntry>,
    pub error_markers: usize,
}

pub struct Composer<'a> {
    style: &'a ResolvedStyle,
    fonts: &'a FontRegistry,
    frame: Frame,
    images: ImageStore,
    pages: Vec<PageState>,
    current: PageState,
    /// Top of the free space on the current page
    cursor: f32,
    /// Space owed after the last item, collapsed with the next item's space before
    gap: f32,
    depth: usize,
    break_after_group: bool,
    toc: Vec<TocEntry>,
    error_markers: usize,
    warned: HashSet<String>,
}

impl<'a> Composer<'a> {
    pub fn new(style: &'a ResolvedStyle, fonts: &'a FontRegistry) -> Composer<'a> {
        let frame = style.frame();
        Composer {
            style,
            fonts,
            frame,
            images: ImageStore::default(),
            pages: Vec::new(),
            current: PageState::new(0, style.geometry),
            cursor: frame.top(),
            gap: 0.0,
            depth: 0,
            break_after_group: false,
            toc: Vec::new(),
            error_markers: 0,
            warned: HashSet::new(),
        }
    }

    pub fn style(&self) -> &'a ResolvedStyle {
        self.style
    }

    pub fn fonts(&self) -> &'a FontRegistry {
        self.fonts
    }

    /// 0-based index of the page being composed.
    pub fn page_index(&self) -> usize {
        self.current.index
    }

    pub fn new_page(&mut self) {
        let next = PageState::new(self.current.index + 1, self.style.geometry);
        let done = std::mem::replace(&mut self.current, next);
        log::trace!("Closed page {}", done.index + 1);
        self.pages.push(done);
        self.cursor = self.frame.top();
        self.gap = 0.0;
    }

    /// Starts a new page unless the current one is still blank.
    pub fn break_page(&mut self) {
        if !self.current.is_blank() {
            self.new_page();
        }
    }

    /// Sets aside `count` blank pages and returns the index of the first.
    pub fn reserve_pages(&mut self, count: usize) -> usize {
        self.break_page();
        let first = self.current.index;
        for _ in 0..count {
            self.new_page();
        }
        first
    }

    /// Lays `runs` out at an absolute position on the current page, ignoring the
    /// flow. Returns the bottom of the block.
    pub fn place(&mut self, runs: &[Inline], style: &TextStyle, top: f32) -> f32 {
        let lines = break_lines(&pieces(runs, style, self.fonts), self.fonts, self.frame.width);
        let mut top = top;
        for line in &lines {
            draw_line(
                &mut self.current,
                line,
                style,
                style.alignment,
                self.frame.left,
                self.frame.width,
                top,
            );
            top -= style.leading;
        }
        top
    }

    /// Places one flow item. A failing item is replaced by a visible error marker and
    /// composition carries on.
    pub fn push(&mut self, item: &FlowItem) {
        if let Err(e) = self.compose(item) {
            let message = format!("{e:#}");
            if self.warned.insert(message.clone()) {
                log::warn!("{message}");
            } else {
                log::debug!("{message}");
            }
            self.error_marker(&e.to_string());
        }
        if self.depth == 0 && self.break_after_group {
            self.break_after_group = false;
            self.break_page();
        }
    }

    pub fn finish(self) -> Composed {
        let Composer {
            mut pages,
            current,
            images,
            toc,
            error_markers,
            ..
        } = self;
        if !current.is_blank() || pages.is_empty() {
            pages.push(current);
        }
        Composed {
            pages,
            images,
            toc,
            error_markers,
        }
    }

    fn compose(&mut self, item: &FlowItem) -> Result<()> {
        match item {
            FlowItem::Paragraph(p) => self.paragraph(p),
            FlowItem::Preformatted(listing) => self.listing(listing),
            FlowItem::Table(table) => self.table(table)?,
            FlowItem::Image(image) => self.image(image)?,
            FlowItem::Rule(divider) => self.rule(divider),
            FlowItem::PageBreak => self.break_page(),
            FlowItem::KeepTogether(items) => self.keep_together(items),
        }
        Ok(())
    }

    fn error_marker(&mut self, message: &str) {
        self.error_markers += 1;
        let marker = Paragraph::new(
            vec![Inline::plain(format!("[{message}]"))],
            self.style.error.clone(),
        );
        self.paragraph(&marker);
    }

    fn at_top(&self) -> bool {
        self.cursor >= self.frame.top() - EPSILON
    }

    fn remaining(&self) -> f32 {
        self.cursor - self.frame.bottom
    }

    fn open_block(&mut self, space_before: f32) {
        let gap = self.gap.max(space_before);
        self.gap = 0.0;
        if self.at_top() {
            return;
        }
        if gap >= self.remaining() {
            self.new_page();
        } else {
            self.cursor -= gap;
        }
    }

    /// Moves to a new page unless `height` fits in what is left of this one.
    fn ensure(&mut self, height: f32) {
        if height > self.remaining() + EPSILON && !self.at_top() {
            self.new_page();
        }
    }

    fn mark(&mut self, mark: &TocMark) {
        self.toc.push(TocEntry {
            level: mark.level,
            text: mark.text.clone(),
            page: self.current.index + 1,
        });
    }

    fn paragraph_lines(&self, p: &Paragraph) -> Vec<Line> {
        let width = (self.frame.width - p.style.indent).max(1.0);
        break_lines(&pieces(&p.runs, &p.style, self.fonts), self.fonts, width)
    }

    fn paragraph(&mut self, p: &Paragraph) {
        let style = &p.style;
        let width = (self.frame.width - style.indent).max(1.0);
        let lines = self.paragraph_lines(p);

        self.open_block(style.space_before);
        let needed = if p.keep_with_next {
            lines.len() as f32 * style.leading + KEEP_WITH_NEXT_LINES * self.style.body.leading
        } else {
            style.leading
        };
        self.ensure(needed.min(self.frame.height));

        for (i, line) in lines.iter().enumerate() {
            if self.remaining() < style.leading - EPSILON && !self.at_top() {
                self.new_page();
            }
            if i == 0 {
                if let Some(mark) = &p.toc {
                    self.mark(mark);
                }
            }
            draw_line(
                &mut self.current,
                line,
                style,
                style.alignment,
                self.frame.left + style.indent,
                width,
                self.cursor,
            );
            self.cursor -= style.leading;
        }
        self.gap = style.space_after;
    }

    fn listing_lines(&self, listing: &CodeListing) -> Vec<Line> {
        let width = (self.frame.width - 2.0 * listing.style.padding).max(1.0);
        listing
            .lines
            .iter()
            .flat_map(|spans| break_code_line(spans, &listing.style.text, self.fonts, width))
            .collect()
    }

    fn listing(&mut self, listing: &CodeListing) {
        let text = &listing.style.text;
        let pad = listing.style.padding;
        let width = (self.frame.width - 2.0 * pad).max(1.0);
        let lines = self.listing_lines(listing);

        self.open_block(text.space_before);
        self.ensure((text.leading + 2.0 * pad).min(self.frame.height));

        let mut start = self.current.ops.len();
        let mut top = self.cursor;
        let mut drawn = false;
        self.cursor -= pad;
        for line in &lines {
            if drawn && self.remaining() < text.leading + pad - EPSILON {
                let bottom = (self.cursor - pad).max(self.frame.bottom);
                self.background(start, top, bottom, listing.style.background);
                self.new_page();
                start = self.current.ops.len();
                top = self.cursor;
                self.cursor -= pad;
            }
            draw_line(
                &mut self.current,
                line,
                text,
                Alignment::Left,
                self.frame.left + pad,
                width,
                self.cursor,
            );
            self.cursor -= text.leading;
            drawn = true;
        }
        self.cursor = (self.cursor - pad).max(self.frame.bottom);
        self.background(start, top, self.cursor, listing.style.background);
        self.gap = text.space_after;
    }

    /// Slides a filled rectangle underneath the ops drawn since `at`.
    fn background(&mut self, at: usize, top: f32, bottom: f32, fill: Colour) {
        self.current.ops.insert(
            at,
            DrawOp::Rect {
                x: self.frame.left,
                y: bottom,
                width: self.frame.width,
                height: top - bottom,
                fill,
            },
        );
    }

    fn table_row(
        &self,
        cells: &[Vec<Inline>],
        text: &TextStyle,
        style: &TableStyle,
        columns: usize,
        inner: f32,
    ) -> RowLayout {
        let cells: Vec<Vec<Line>> = (0..columns)
            .map(|c| {
                let runs = cells.get(c).map(Vec::as_slice).unwrap_or(&[]);
                break_lines(&pieces(runs, text, self.fonts), self.fonts, inner)
            })
            .collect();
        let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
        RowLayout {
            cells,
            height: lines as f32 * text.leading + 2.0 * style.padding,
        }
    }

    fn table_layout(&self, table: &TableBlock) -> Result<TableLayout> {
        let columns = table.column_count();
        if columns == 0 {
            return Err(anyhow!("Table has no columns"));
        }
        let style = &table.style;
        let column_width = self.frame.width / columns as f32;
        let inner_width = column_width - 2.0 * style.padding;
        if inner_width < style.text.size {
            return Err(anyhow!("Table with {columns} columns does not fit the page width"));
        }

        let header = (!table.headers.is_empty())
            .then(|| self.table_row(&table.headers, &style.header, style, columns, inner_width));
        let rows = table
            .rows
            .iter()
            .map(|row| self.table_row(row, &style.text, style, columns, inner_width))
            .collect();
        Ok(TableLayout {
            header,
            rows,
            columns,
            column_width,
            inner_width,
        })
    }

    fn table(&mut self, table: &TableBlock) -> Result<()> {
        let layout = self.table_layout(table)?;
        let style = &table.style;

        self.open_block(style.text.space_before);
        let first = layout.header.as_ref().map(|h| h.height).unwrap_or(0.0)
            + layout.rows.first().map(|r| r.height).unwrap_or(0.0);
        self.ensure(first.min(self.frame.height));

        if let Some(header) = &layout.header {
            self.table_row_draw(header, &layout, style, true);
        }
        for row in &layout.rows {
            if row.height > self.remaining() + EPSILON && !self.at_top() {
                self.new_page();
                if let Some(header) = &layout.header {
                    self.table_row_draw(header, &layout, style, true);
                }
            }
            self.table_row_draw(row, &layout, style, false);
        }
        self.gap = style.text.space_after;
        Ok(())
    }

    fn table_row_draw(
        &mut self,
        row: &RowLayout,
        layout: &TableLayout,
        style: &TableStyle,
        header: bool,
    ) {
        let top = self.cursor;
        let bottom = top - row.height;
        let left = self.frame.left;
        let right = left + layout.column_width * layout.columns as f32;
        let text = if header { &style.header } else { &style.text };

        if header {
            self.current.ops.push(DrawOp::Rect {
                x: left,
                y: bottom,
                width: right - left,
                height: row.height,
                fill: style.header_background,
            });
        }
        for (c, lines) in row.cells.iter().enumerate() {
            let cell_left = left + c as f32 * layout.column_width + style.padding;
            let mut y = top - style.padding;
            for line in lines {
                draw_line(
                    &mut self.current,
                    line,
                    text,
                    unjustified(text.alignment),
                    cell_left,
                    layout.inner_width,
                    y,
                );
                y -= text.leading;
            }
        }

        let grid = |from: (f32, f32), to: (f32, f32)| DrawOp::Line {
            from,
            to,
            width: GRID_WIDTH,
            colour: style.grid,
            kind: RuleKind::Solid,
        };
        let mut lines = vec![
            grid((left, top), (right, top)),
            grid((left, bottom), (right, bottom)),
        ];
        for c in 0..=layout.columns {
            let x = left + c as f32 * layout.column_width;
            lines.push(grid((x, top), (x, bottom)));
        }
        self.current.ops.extend(lines);
        self.cursor = bottom;
    }

    /// Loads an image and sizes it for the frame: at most its style's width, never
    /// taller than the frame less room for a caption.
    fn image_size(&mut self, block: &ImageBlock) -> Result<(ImageId, f32, f32)> {
        let id = self.images.load(&block.path)?;
        let aspect = self
            .images
            .get(id)
            .map(|image| image.aspect())
            .ok_or_else(|| anyhow!("Image {} was not stored", block.path.display()))?;

        let mut width = block.style.max_width.min(self.frame.width).max(1.0);
        let mut height = width * aspect;
        let limit = (self.frame.height - 2.0 * block.style.caption.leading)
            .max(self.frame.height / 2.0);
        if height > limit {
            height = limit;
            width = height / aspect;
        }
        Ok((id, width, height))
    }

    fn image(&mut self, block: &ImageBlock) -> Result<()> {
        let (image, width, height) = self.image_size(block)?;
        let style = &block.style;

        let full_page = height > style.full_page_threshold * self.frame.height;
        if full_page && style.full_page_break {
            log::debug!("Giving {} a page of its own", block.path.display());
            self.break_page();
            self.break_after_group = true;
        }

        self.open_block(style.space_before);
        self.ensure(height);
        let x = self.frame.left + (self.frame.width - width) / 2.0;
        let y = self.cursor - height;
        self.current.ops.push(DrawOp::Image {
            image,
            x,
            y,
            width,
            height,
        });
        self.cursor = y;
        self.gap = style.space_after;
        Ok(())
    }

    fn rule(&mut self, divider: &Divider) {
        self.open_block(divider.space_before);
        self.ensure(divider.width);
        let length = self.frame.width * divider.length;
        let x = self.frame.left + (self.frame.width - length) / 2.0;
        let y = self.cursor - divider.width / 2.0;
        self.current.ops.push(DrawOp::Line {
            from: (x, y),
            to: (x + length, y),
            width: divider.width,
            colour: divider.colour,
            kind: divider.kind,
        });
        self.cursor -= divider.width;
        self.gap = divider.space_after;
    }

    /// Height an item would take in an unbroken frame.
    fn measure(&mut self, item: &FlowItem) -> f32 {
        match item {
            FlowItem::Paragraph(p) => {
                p.style.space_before + self.paragraph_lines(p).len() as f32 * p.style.leading
            }
            FlowItem::Preformatted(listing) => {
                let text = &listing.style.text;
                text.space_before
                    + 2.0 * listing.style.padding
                    + self.listing_lines(listing).len() as f32 * text.leading
            }
            FlowItem::Table(table) => match self.table_layout(table) {
                Ok(layout) => {
                    table.style.text.space_before
                        + layout.header.iter().chain(&layout.rows).map(|r| r.height).sum::<f32>()
                }
                Err(_) => self.style.error.leading,
            },
            FlowItem::Image(block) => match self.image_size(block) {
                Ok((_, _, height)) => block.style.space_before + height,
                Err(_) => self.style.error.leading,
            },
            FlowItem::Rule(divider) => divider.space_before + divider.width,
            FlowItem::PageBreak => 0.0,
            FlowItem::KeepTogether(items) => {
                let mut height = 0.0;
                for item in items {
                    height += self.measure(item);
                }
                height
            }
        }
    }

    fn keep_together(&mut self, items: &[FlowItem]) {
        let mut height = 0.0;
        for item in items {
            height += self.measure(item);
        }
        if height <= self.frame.height && height > self.remaining() && !self.at_top() {
            self.new_page();
        }

        self.depth += 1;
        for item in items {
            self.push(item);
        }
        self.depth -= 1;
    }
}
