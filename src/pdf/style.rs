//! The CSS subset understood by the converter.
//!
//! Only simple selectors (`tag`, `.class`, `#id` and their compounds) are
//! matched. Rules apply in source order, inline `style` attributes last.

use regex::Regex;
use std::sync::OnceLock;

pub const PX_TO_PT: f32 = 0.75;
pub const DEFAULT_FONT_SIZE: f32 = 12.0;
pub const DEFAULT_LINE_HEIGHT: f32 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);

    fn from_bytes(r: u8, g: u8, b: u8) -> Self {
        Rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if let Some(hex) = value.strip_prefix('#') {
            let digits: Vec<u8> = hex
                .chars()
                .map(|c| c.to_digit(16).map(|d| d as u8))
                .collect::<Option<_>>()?;
            return match digits.as_slice() {
                [r, g, b] => Some(Self::from_bytes(r * 17, g * 17, b * 17)),
                [r1, r2, g1, g2, b1, b2] => {
                    Some(Self::from_bytes(r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2))
                }
                _ => None,
            };
        }
        if let Some(args) = value
            .strip_prefix("rgb(")
            .or_else(|| value.strip_prefix("rgba("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<u8> = args
                .split(',')
                .take(3)
                .map(|p| p.trim().parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0) as u8))
                .collect::<Option<_>>()?;
            return match parts.as_slice() {
                [r, g, b] => Some(Self::from_bytes(*r, *g, *b)),
                _ => None,
            };
        }
        let (r, g, b) = match value.as_str() {
            "black" => (0, 0, 0),
            "white" => (255, 255, 255),
            "red" => (255, 0, 0),
            "green" => (0, 128, 0),
            "darkgreen" => (0, 100, 0),
            "blue" => (0, 0, 255),
            "navy" => (0, 0, 128),
            "gray" | "grey" => (128, 128, 128),
            "silver" => (192, 192, 192),
            "maroon" => (128, 0, 0),
            "olive" => (128, 128, 0),
            "purple" => (128, 0, 128),
            "teal" => (0, 128, 128),
            "orange" => (255, 165, 0),
            "gold" => (255, 215, 0),
            "brown" => (165, 42, 42),
            _ => return None,
        };
        Some(Self::from_bytes(r, g, b))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// A CSS length, resolved late because `em` depends on the final font size
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Pt(f32),
    Em(f32),
    Percent(f32),
}

impl Length {
    pub const ZERO: Length = Length::Pt(0.0);

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        let split = value
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
            .unwrap_or(value.len());
        let (number, unit) = value.split_at(split);
        let number: f32 = number.parse().ok()?;

        let length = match unit.trim() {
            "pt" => Length::Pt(number),
            "" | "px" => Length::Pt(number * PX_TO_PT),
            "mm" => Length::Pt(number * 72.0 / 25.4),
            "cm" => Length::Pt(number * 72.0 / 2.54),
            "in" => Length::Pt(number * 72.0),
            "pc" => Length::Pt(number * 12.0),
            "em" | "rem" => Length::Em(number),
            "%" => Length::Percent(number),
            _ => return None,
        };
        Some(length)
    }

    /// Resolves to points; `reference` is what 100% means
    pub fn resolve(self, font_size: f32, reference: f32) -> f32 {
        match self {
            Length::Pt(v) => v,
            Length::Em(v) => v * font_size,
            Length::Percent(v) => v / 100.0 * reference,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn uniform(v: f32) -> Self {
        Self { top: v, right: v, bottom: v, left: v }
    }

    /// `margin` shorthand with one to four lengths
    pub fn parse(value: &str, font_size: f32) -> Option<Self> {
        let values: Vec<f32> = value
            .split_whitespace()
            .map(|v| Length::parse(v).map(|l| l.resolve(font_size, 0.0)))
            .collect::<Option<_>>()?;
        let m = match values.as_slice() {
            [a] => Self::uniform(*a),
            [v, h] => Self { top: *v, right: *h, bottom: *v, left: *h },
            [t, h, b] => Self { top: *t, right: *h, bottom: *b, left: *h },
            [t, r, b, l] => Self { top: *t, right: *r, bottom: *b, left: *l },
            _ => return None,
        };
        Some(m)
    }
}

pub type Declarations = Vec<(String, String)>;

/// Parses `prop: value; prop: value` as found in style attributes
pub fn parse_declarations(css: &str) -> Declarations {
    css.split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim().trim_end_matches("!important").trim();
            (!prop.is_empty() && !value.is_empty()).then(|| (prop, value.to_string()))
        })
        .collect()
}

/// Extracts the target of `url(...)`
pub fn parse_url(value: &str) -> Option<String> {
    let inner = value.trim().strip_prefix("url(")?.strip_suffix(')')?.trim();
    let inner = inner.trim_matches(|c| c == '"' || c == '\'');
    (!inner.is_empty()).then(|| inner.to_string())
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl SimpleSelector {
    fn parse(text: &str) -> Option<Self> {
        static SELECTOR: OnceLock<Regex> = OnceLock::new();
        let re = SELECTOR.get_or_init(|| {
            Regex::new(r"^([A-Za-z][A-Za-z0-9]*|\*)?((?:[#.][A-Za-z0-9_-]+)*)$").unwrap()
        });
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let caps = re.captures(text)?;

        let mut selector = SimpleSelector {
            tag: caps
                .get(1)
                .map(|m| m.as_str().to_ascii_lowercase())
                .filter(|t| t != "*"),
            ..Default::default()
        };
        let rest = caps.get(2).map_or("", |m| m.as_str());
        for part in split_qualifiers(rest) {
            if let Some(id) = part.strip_prefix('#') {
                selector.id = Some(id.to_string());
            } else if let Some(class) = part.strip_prefix('.') {
                selector.classes.push(class.to_string());
            }
        }
        Some(selector)
    }

    fn matches(&self, element: &ElementInfo) -> bool {
        self.tag.as_deref().map_or(true, |t| t == element.tag)
            && self.id.as_deref().map_or(true, |id| Some(id) == element.id)
            && self.classes.iter().all(|c| element.classes.contains(&c.as_str()))
    }
}

fn split_qualifiers(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in s.char_indices().skip(1) {
        if c == '#' || c == '.' {
            parts.push(&s[start..i]);
            start = i;
        }
    }
    if start < s.len() {
        parts.push(&s[start..]);
    }
    parts
}

/// What a selector needs to know about an element
pub struct ElementInfo<'a> {
    pub tag: &'a str,
    pub id: Option<&'a str>,
    pub classes: Vec<&'a str>,
}

#[derive(Debug, Clone)]
struct Rule {
    selectors: Vec<SimpleSelector>,
    declarations: Declarations,
}

/// Rules gathered from the document's `<style>` elements
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: Vec<Rule>,
    page: Declarations,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        static COMMENT: OnceLock<Regex> = OnceLock::new();
        static RULE: OnceLock<Regex> = OnceLock::new();
        let comment = COMMENT.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
        let rule = RULE.get_or_init(|| Regex::new(r"([^{}]+)\{([^{}]*)\}").unwrap());

        let css = comment.replace_all(css, "");
        let mut sheet = Stylesheet::default();

        for caps in rule.captures_iter(&css) {
            let selector_text = caps[1].trim();
            let declarations = parse_declarations(&caps[2]);

            if selector_text.starts_with("@page") {
                sheet.page.extend(declarations);
                continue;
            }
            if selector_text.starts_with('@') {
                continue;
            }

            // Complex selectors (descendants, pseudo-classes) are not matched
            let selectors: Vec<SimpleSelector> = selector_text
                .split(',')
                .filter_map(SimpleSelector::parse)
                .collect();
            if !selectors.is_empty() {
                sheet.rules.push(Rule { selectors, declarations });
            }
        }
        sheet
    }

    /// Declarations from every rule matching `element`, in source order
    pub fn matching<'s>(&'s self, element: &'s ElementInfo<'s>) -> impl Iterator<Item = &'s (String, String)> + 's {
        self.rules
            .iter()
            .filter(move |rule| rule.selectors.iter().any(|s| s.matches(element)))
            .flat_map(|rule| rule.declarations.iter())
    }

    pub fn page_declarations(&self) -> &Declarations {
        &self.page
    }
}

/// Style after cascading; only some properties inherit
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub align: Align,
    pub color: Rgb,
    pub line_height: f32,
    pub margin_top: Length,
    pub margin_bottom: Length,
    pub width: Option<Length>,
    pub height: Option<Length>,
    pub background_image: Option<String>,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            bold: false,
            italic: false,
            align: Align::Left,
            color: Rgb::BLACK,
            line_height: DEFAULT_LINE_HEIGHT,
            margin_top: Length::ZERO,
            margin_bottom: Length::ZERO,
            width: None,
            height: None,
            background_image: None,
        }
    }
}

impl ComputedStyle {
    /// Child style: inheritable properties copied, box properties reset
    pub fn inherit(&self) -> Self {
        Self {
            font_size: self.font_size,
            bold: self.bold,
            italic: self.italic,
            align: self.align,
            color: self.color,
            line_height: self.line_height,
            ..Default::default()
        }
    }

    pub fn apply_all<'a>(&mut self, declarations: impl IntoIterator<Item = &'a (String, String)>) {
        for (prop, value) in declarations {
            self.apply(prop, value);
        }
    }

    /// Applies one declaration; unknown properties and bad values are ignored
    pub fn apply(&mut self, prop: &str, value: &str) {
        let lower = value.trim().to_ascii_lowercase();
        match prop {
            "font-size" => {
                if let Some(len) = Length::parse(&lower) {
                    self.font_size = len.resolve(self.font_size, self.font_size).max(0.0);
                }
            }
            "font-weight" => {
                self.bold = match lower.as_str() {
                    "bold" | "bolder" => true,
                    "normal" | "lighter" => false,
                    n => n.parse::<u16>().map(|w| w >= 600).unwrap_or(self.bold),
                }
            }
            "font-style" => self.italic = matches!(lower.as_str(), "italic" | "oblique"),
            "text-align" => {
                self.align = match lower.as_str() {
                    "center" => Align::Center,
                    "right" | "end" => Align::Right,
                    "left" | "start" | "justify" => Align::Left,
                    _ => self.align,
                }
            }
            "color" => {
                if let Some(c) = Rgb::parse(&lower) {
                    self.color = c;
                }
            }
            "line-height" => {
                if lower == "normal" {
                    self.line_height = DEFAULT_LINE_HEIGHT;
                } else if let Ok(factor) = lower.parse::<f32>() {
                    self.line_height = factor;
                } else if let Some(len) = Length::parse(&lower) {
                    if self.font_size > 0.0 {
                        self.line_height = len.resolve(self.font_size, self.font_size) / self.font_size;
                    }
                }
            }
            "margin" => {
                let parts: Vec<&str> = lower.split_whitespace().collect();
                let (top, bottom) = match parts.as_slice() {
                    [a] => (*a, *a),
                    [v, _] => (*v, *v),
                    [t, _, b] | [t, _, b, _] => (*t, *b),
                    _ => return,
                };
                if let (Some(t), Some(b)) = (Length::parse(top), Length::parse(bottom)) {
                    self.margin_top = t;
                    self.margin_bottom = b;
                }
            }
            "margin-top" => {
                if let Some(len) = Length::parse(&lower) {
                    self.margin_top = len;
                }
            }
            "margin-bottom" => {
                if let Some(len) = Length::parse(&lower) {
                    self.margin_bottom = len;
                }
            }
            "width" => self.width = Length::parse(&lower),
            "height" => self.height = Length::parse(&lower),
            "background-image" | "background" => {
                if let Some(url) = value.split_whitespace().find_map(parse_url) {
                    self.background_image = Some(url);
                }
            }
            _ => {}
        }
    }
}

/// Built-in defaults for tags, applied before any stylesheet rule
pub fn user_agent_declarations(tag: &str) -> &'static [(&'static str, &'static str)] {
    match tag {
        "h1" => &[("font-size", "2em"), ("font-weight", "bold"), ("margin", "0.67em 0")],
        "h2" => &[("font-size", "1.5em"), ("font-weight", "bold"), ("margin", "0.83em 0")],
        "h3" => &[("font-size", "1.17em"), ("font-weight", "bold"), ("margin", "1em 0")],
        "h4" => &[("font-weight", "bold"), ("margin", "1.33em 0")],
        "h5" => &[("font-size", "0.83em"), ("font-weight", "bold"), ("margin", "1.67em 0")],
        "h6" => &[("font-size", "0.67em"), ("font-weight", "bold"), ("margin", "2.33em 0")],
        "p" | "blockquote" | "ul" | "ol" => &[("margin", "1em 0")],
        "b" | "strong" | "th" => &[("font-weight", "bold")],
        "i" | "em" | "cite" => &[("font-style", "italic")],
        "center" => &[("text-align", "center")],
        "small" => &[("font-size", "0.83em")],
        _ => &[],
    }
}
