//! Flows blocks onto fixed-size pages.
//!
//! Coordinates here are measured from the top-left corner of the page, in
//! points. The writer flips them into PDF user space.

use crate::pdf::fonts::{FontBook, FontFace, TextRun};
use crate::pdf::images::ImageStore;
use crate::pdf::markup::{Block, ImageBlock, ParsedMarkup, TextBlock};
use crate::pdf::style::{Align, Declarations, Length, Margins, Rgb, DEFAULT_FONT_SIZE, PX_TO_PT};

const MM: f32 = 72.0 / 25.4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub width: f32,
    pub height: f32,
    pub margins: Margins,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            width: 210.0 * MM,
            height: 297.0 * MM,
            margins: Margins::uniform(20.0 * MM),
        }
    }
}

impl PageSetup {
    /// Reads `size` and `margin` from an `@page` rule
    pub fn from_declarations(declarations: &Declarations) -> Self {
        let mut setup = PageSetup::default();
        for (prop, value) in declarations {
            match prop.as_str() {
                "size" => {
                    if let Some((w, h)) = parse_page_size(value) {
                        setup.width = w;
                        setup.height = h;
                    }
                }
                "margin" => {
                    if let Some(m) = Margins::parse(value, DEFAULT_FONT_SIZE) {
                        setup.margins = m;
                    }
                }
                "margin-top" | "margin-right" | "margin-bottom" | "margin-left" => {
                    if let Some(len) = Length::parse(value) {
                        let v = len.resolve(DEFAULT_FONT_SIZE, 0.0);
                        match prop.as_str() {
                            "margin-top" => setup.margins.top = v,
                            "margin-right" => setup.margins.right = v,
                            "margin-bottom" => setup.margins.bottom = v,
                            _ => setup.margins.left = v,
                        }
                    }
                }
                _ => {}
            }
        }
        setup
    }

    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn content_width(&self) -> f32 {
        (self.width - self.margins.left - self.margins.right).max(1.0)
    }

    pub fn content_height(&self) -> f32 {
        (self.height - self.margins.top - self.margins.bottom).max(1.0)
    }
}

fn parse_page_size(value: &str) -> Option<(f32, f32)> {
    let lower = value.to_ascii_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    let landscape = words.contains(&"landscape");

    let named = words.iter().find_map(|w| match *w {
        "a3" => Some((297.0 * MM, 420.0 * MM)),
        "a4" => Some((210.0 * MM, 297.0 * MM)),
        "a5" => Some((148.0 * MM, 210.0 * MM)),
        "letter" => Some((612.0, 792.0)),
        "legal" => Some((612.0, 1008.0)),
        _ => None,
    });

    let (w, h) = match named {
        Some(size) => size,
        None => {
            let lengths: Vec<f32> = words
                .iter()
                .filter_map(|w| Length::parse(w))
                .map(|l| l.resolve(DEFAULT_FONT_SIZE, 0.0))
                .collect();
            match lengths.as_slice() {
                [w, h] => (*w, *h),
                [side] => (*side, *side),
                [] if landscape || words.contains(&"portrait") => PageSetup::default().size(),
                _ => return None,
            }
        }
    };
    if landscape {
        Some((w.max(h), w.min(h)))
    } else {
        Some((w, h))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub x: f32,
    pub baseline: f32,
    pub size: f32,
    pub color: Rgb,
    pub runs: Vec<TextRun>,
}

impl PlacedText {
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImage {
    pub image: usize,
    pub x: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Placed {
    Text(PlacedText),
    Image(PlacedImage),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Placed>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaidOut {
    pub setup: PageSetup,
    /// Image indices drawn full-page behind every page
    pub backgrounds: Vec<usize>,
    pub pages: Vec<Page>,
}

pub fn layout(parsed: &ParsedMarkup, images: &ImageStore, fonts: &FontBook) -> LaidOut {
    let mut flow = Flow::new(parsed.page);
    for block in &parsed.blocks {
        match block {
            Block::Text(text) => flow.text(text, fonts),
            Block::Image(image) => flow.image(image, images),
        }
    }

    LaidOut {
        setup: parsed.page,
        backgrounds: parsed
            .backgrounds
            .iter()
            .filter_map(|src| images.get(src).map(|(idx, _)| idx))
            .collect(),
        pages: flow.pages,
    }
}

struct Flow {
    setup: PageSetup,
    pages: Vec<Page>,
    cursor: f32,
    /// Bottom margin of the previous block, collapsed with the next top margin
    pending_margin: f32,
}

impl Flow {
    fn new(setup: PageSetup) -> Self {
        Self {
            setup,
            pages: vec![Page::default()],
            cursor: setup.margins.top,
            pending_margin: 0.0,
        }
    }

    fn bottom(&self) -> f32 {
        self.setup.height - self.setup.margins.bottom
    }

    fn current(&mut self) -> &mut Page {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Starts a new page if `height` does not fit, unless the page is empty
    fn reserve(&mut self, height: f32) {
        if self.cursor + height > self.bottom() && self.cursor > self.setup.margins.top {
            self.pages.push(Page::default());
            self.cursor = self.setup.margins.top;
        }
    }

    fn open_block(&mut self, margin_top: f32) {
        let gap = self.pending_margin.max(margin_top);
        if self.cursor > self.setup.margins.top {
            self.cursor += gap;
        }
        self.pending_margin = 0.0;
    }

    fn x_for(&self, align: Align, width: f32) -> f32 {
        let free = (self.setup.content_width() - width).max(0.0);
        self.setup.margins.left
            + match align {
                Align::Left => 0.0,
                Align::Center => free / 2.0,
                Align::Right => free,
            }
    }

    fn text(&mut self, block: &TextBlock, fonts: &FontBook) {
        let style = &block.style;
        let size = style.font_size;
        let width = self.setup.content_width();
        let face = FontFace::select(style.bold, style.italic);
        let line_height = size * style.line_height;

        self.open_block(style.margin_top.resolve(size, width));

        for line in wrap(&block.text, fonts, face, size, width) {
            self.reserve(line_height);
            let line_width = fonts.text_width(face, &line, size);
            let baseline = self.cursor + (line_height - size) / 2.0 + size * fonts.ascent(face);
            let x = self.x_for(style.align, line_width);
            if !line.is_empty() {
                self.current().items.push(Placed::Text(PlacedText {
                    x,
                    baseline,
                    size,
                    color: style.color,
                    runs: fonts.runs(face, &line),
                }));
            }
            self.cursor += line_height;
        }

        self.pending_margin = style.margin_bottom.resolve(size, width);
    }

    fn image(&mut self, block: &ImageBlock, images: &ImageStore) {
        let Some((index, image)) = images.get(&block.src) else {
            return;
        };
        let style = &block.style;
        let content_width = self.setup.content_width();
        let content_height = self.setup.content_height();

        let natural = (image.width as f32 * PX_TO_PT, image.height as f32 * PX_TO_PT);
        let css_w = style.width.map(|l| l.resolve(style.font_size, content_width));
        let css_h = style.height.map(|l| l.resolve(style.font_size, content_height));
        let (mut w, mut h) = fit_size(natural, css_w.or(block.width), css_h.or(block.height));

        // Never larger than the content box
        let scale = (content_width / w).min(content_height / h).min(1.0);
        w *= scale;
        h *= scale;

        self.open_block(style.margin_top.resolve(style.font_size, content_width));
        self.reserve(h);
        let x = self.x_for(style.align, w);
        let top = self.cursor;
        self.current().items.push(Placed::Image(PlacedImage {
            image: index,
            x,
            top,
            width: w,
            height: h,
        }));
        self.cursor += h;
        self.pending_margin = style.margin_bottom.resolve(style.font_size, content_width);
    }
}

/// Fills in a missing dimension from the aspect ratio
fn fit_size(natural: (f32, f32), width: Option<f32>, height: Option<f32>) -> (f32, f32) {
    let (nw, nh) = (natural.0.max(1.0), natural.1.max(1.0));
    match (width, height) {
        (Some(w), Some(h)) => (w.max(1.0), h.max(1.0)),
        (Some(w), None) => (w.max(1.0), (w * nh / nw).max(1.0)),
        (None, Some(h)) => ((h * nw / nh).max(1.0), h.max(1.0)),
        (None, None) => (nw, nh),
    }
}

/// Greedy word wrap; explicit newlines always break. Always yields at least one line.
pub fn wrap(text: &str, fonts: &FontBook, face: FontFace, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", line, word)
            };
            if fonts.text_width(face, &candidate, size) <= max_width {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if fonts.text_width(face, word, size) <= max_width {
                line = word.to_string();
            } else {
                // Hard break a word wider than the line
                for c in word.chars() {
                    line.push(c);
                    if fonts.text_width(face, &line, size) > max_width && line.chars().count() > 1 {
                        line.pop();
                        lines.push(std::mem::take(&mut line));
                        line.push(c);
                    }
                }
            }
        }
        lines.push(line);
    }
    lines
}
