//! Turns rendered HTML into a flat list of layout blocks.

use crate::error::Result;
use crate::pdf::layout::PageSetup;
use crate::pdf::style::{parse_declarations, user_agent_declarations, ComputedStyle, ElementInfo, Stylesheet};
use log::debug;
use scraper::{ElementRef, Html, Node};

/// Elements whose content is never rendered
const SKIPPED: [&str; 7] = ["head", "script", "style", "title", "template", "noscript", "meta"];

/// Elements that start a new block
const BLOCK_TAGS: [&str; 29] = [
    "html", "body", "div", "section", "article", "main", "header", "footer", "nav", "aside",
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "ul", "ol", "li", "table", "tbody",
    "thead", "tr", "td", "th", "center", "img",
];

/// Blocks that keep their line even when empty
const TEXT_TAGS: [&str; 8] = ["p", "h1", "h2", "h3", "h4", "h5", "h6", "li"];

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub style: ComputedStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub src: String,
    pub style: ComputedStyle,
    /// `width`/`height` attributes, in points
    pub width: Option<f32>,
    pub height: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text(TextBlock),
    Image(ImageBlock),
}

/// Everything the layout step needs from the markup
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMarkup {
    pub title: Option<String>,
    pub page: PageSetup,
    /// Images stretched behind the content of every page
    pub backgrounds: Vec<String>,
    pub blocks: Vec<Block>,
}

impl ParsedMarkup {
    /// Every image source, in first-use order
    pub fn image_sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        let blocks = self.blocks.iter().filter_map(|b| match b {
            Block::Image(img) => Some(img.src.as_str()),
            Block::Text(_) => None,
        });
        for src in self.backgrounds.iter().map(String::as_str).chain(blocks) {
            if !sources.contains(&src) {
                sources.push(src);
            }
        }
        sources
    }

    pub fn text_blocks(&self) -> impl Iterator<Item = &TextBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Text(t) => Some(t),
            Block::Image(_) => None,
        })
    }
}

pub fn parse(markup: &str) -> Result<ParsedMarkup> {
    let html = Html::parse_document(markup);
    let root = html.root_element();

    let css: String = root
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "style")
        .flat_map(|el| el.text())
        .collect::<Vec<_>>()
        .join("\n");
    let stylesheet = Stylesheet::parse(&css);

    let title = root
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "title")
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let mut walker = Walker {
        stylesheet: &stylesheet,
        backgrounds: Vec::new(),
        blocks: Vec::new(),
    };
    walker.walk(root, &ComputedStyle::default());

    let parsed = ParsedMarkup {
        title,
        page: PageSetup::from_declarations(stylesheet.page_declarations()),
        backgrounds: walker.backgrounds,
        blocks: walker.blocks,
    };
    debug!(
        "Parsed markup: {} block(s), {} background(s)",
        parsed.blocks.len(),
        parsed.backgrounds.len()
    );
    Ok(parsed)
}

struct Walker<'s> {
    stylesheet: &'s Stylesheet,
    backgrounds: Vec<String>,
    blocks: Vec<Block>,
}

impl Walker<'_> {
    fn compute(&self, el: ElementRef, parent: &ComputedStyle) -> ComputedStyle {
        let value = el.value();
        let tag = value.name();
        let mut style = parent.inherit();

        for (prop, val) in user_agent_declarations(tag) {
            style.apply(prop, val);
        }

        let info = ElementInfo {
            tag,
            id: value.id(),
            classes: value.classes().collect(),
        };
        style.apply_all(self.stylesheet.matching(&info));

        if let Some(inline) = value.attr("style") {
            style.apply_all(&parse_declarations(inline));
        }
        style
    }

    fn walk(&mut self, el: ElementRef, parent: &ComputedStyle) {
        let tag = el.value().name();
        if SKIPPED.contains(&tag) {
            return;
        }
        let style = self.compute(el, parent);

        if tag == "img" {
            self.push_image(el, style);
            return;
        }
        if matches!(tag, "html" | "body") {
            if let Some(bg) = &style.background_image {
                self.backgrounds.push(bg.clone());
            }
        }

        if has_block_children(el) || matches!(tag, "html" | "body") {
            self.walk_container(el, &style);
        } else {
            let style = match sole_inline_child(el) {
                Some(child) => {
                    let mut inner = self.compute(child, &style);
                    inner.margin_top = style.margin_top;
                    inner.margin_bottom = style.margin_bottom;
                    inner
                }
                None => style,
            };
            let text = inline_text(el);
            if !text.is_empty() || TEXT_TAGS.contains(&tag) {
                self.blocks.push(Block::Text(TextBlock { text, style }));
            }
        }
    }

    /// Children of a block that itself contains blocks; loose inline
    /// content between them becomes anonymous paragraphs
    fn walk_container(&mut self, el: ElementRef, style: &ComputedStyle) {
        let mut pending = String::new();

        for child in el.children() {
            match child.value() {
                Node::Text(text) => pending.push_str(text),
                Node::Element(_) => {
                    let Some(child_el) = ElementRef::wrap(child) else { continue };
                    let name = child_el.value().name();
                    if SKIPPED.contains(&name) {
                        continue;
                    }
                    if BLOCK_TAGS.contains(&name) {
                        self.flush_anonymous(&mut pending, style);
                        self.walk(child_el, style);
                    } else if name == "br" {
                        pending.push('\n');
                    } else {
                        pending.push_str(&raw_inline_text(child_el));
                    }
                }
                _ => {}
            }
        }
        self.flush_anonymous(&mut pending, style);
    }

    fn flush_anonymous(&mut self, pending: &mut String, style: &ComputedStyle) {
        let text = normalize_lines(pending);
        pending.clear();
        if !text.is_empty() {
            let style = style.inherit();
            self.blocks.push(Block::Text(TextBlock { text, style }));
        }
    }

    fn push_image(&mut self, el: ElementRef, style: ComputedStyle) {
        let value = el.value();
        let Some(src) = value.attr("src").map(str::trim).filter(|s| !s.is_empty()) else {
            debug!("Skipping <img> without src");
            return;
        };

        if value.classes().any(|c| c == "background" || c == "bg") {
            self.backgrounds.push(src.to_string());
            return;
        }

        let attr_len = |name: &str| {
            value
                .attr(name)
                .and_then(|v| v.trim().trim_end_matches("px").parse::<f32>().ok())
                .map(|px| px * crate::pdf::style::PX_TO_PT)
        };
        self.blocks.push(Block::Image(ImageBlock {
            src: src.to_string(),
            width: attr_len("width"),
            height: attr_len("height"),
            style,
        }));
    }
}

fn has_block_children(el: ElementRef) -> bool {
    el.children()
        .filter_map(ElementRef::wrap)
        .any(|child| BLOCK_TAGS.contains(&child.value().name()))
}

/// The single element child of a block whose only content it is,
/// as in `<p><strong>Name</strong></p>`
fn sole_inline_child(el: ElementRef) -> Option<ElementRef> {
    let mut found = None;
    for child in el.children() {
        match child.value() {
            Node::Text(text) if text.trim().is_empty() => {}
            Node::Element(_) => {
                let child_el = ElementRef::wrap(child)?;
                if found.is_some() || child_el.value().name() == "br" {
                    return None;
                }
                found = Some(child_el);
            }
            Node::Comment(_) => {}
            _ => return None,
        }
    }
    found
}

/// Text of an inline-only subtree, `<br>` kept as newlines
fn raw_inline_text(el: ElementRef) -> String {
    let mut out = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if e.name() == "br" => out.push('\n'),
            Node::Element(e) if SKIPPED.contains(&e.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    out.push_str(&raw_inline_text(child_el));
                }
            }
            _ => {}
        }
    }
    out
}

fn inline_text(el: ElementRef) -> String {
    normalize_lines(&raw_inline_text(el))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses whitespace per line; blank lines are kept only between content
fn normalize_lines(s: &str) -> String {
    let lines: Vec<String> = s.split('\n').map(collapse_whitespace).collect();
    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());
    match (first, last) {
        (Some(a), Some(b)) => lines[a..=b].join("\n"),
        _ => String::new(),
    }
}
