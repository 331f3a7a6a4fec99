use crate::error::Result;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Maps a font's character codes back to text
#[derive(Debug, Default)]
struct CodeMap {
    /// Two-byte codes from a ToUnicode CMap; empty means single-byte Latin-1
    two_byte: HashMap<u16, String>,
}

impl CodeMap {
    fn parse(cmap: &[u8]) -> Self {
        static BFCHAR: OnceLock<Regex> = OnceLock::new();
        let re = BFCHAR.get_or_init(|| Regex::new(r"<([0-9A-Fa-f]{4})>\s*<([0-9A-Fa-f]+)>").unwrap());

        let text = String::from_utf8_lossy(cmap);
        let mut two_byte = HashMap::new();
        for caps in re.captures_iter(&text) {
            let Ok(code) = u16::from_str_radix(&caps[1], 16) else { continue };
            let units: Vec<u16> = caps[2]
                .as_bytes()
                .chunks(4)
                .filter_map(|chunk| std::str::from_utf8(chunk).ok())
                .filter_map(|hex| u16::from_str_radix(hex, 16).ok())
                .collect();
            two_byte.insert(code, String::from_utf16_lossy(&units));
        }
        Self { two_byte }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        if self.two_byte.is_empty() {
            return bytes.iter().map(|&b| b as char).collect();
        }
        bytes
            .chunks(2)
            .map(|pair| {
                let code = u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]);
                self.two_byte
                    .get(&code)
                    .map(String::as_str)
                    .unwrap_or("\u{FFFD}")
                    .to_string()
            })
            .collect()
    }
}

/// Resources of a page, inherited from the page tree when absent
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    loop {
        if let Ok(resources) = node.get(b"Resources") {
            return doc.dereference(resources).ok()?.1.as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
}

fn page_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, CodeMap> {
    let mut fonts = HashMap::new();
    let Some(font_dict) = page_resources(doc, page_id)
        .and_then(|res| res.get(b"Font").ok())
        .and_then(|obj| doc.dereference(obj).ok())
        .and_then(|(_, obj)| obj.as_dict().ok())
    else {
        return fonts;
    };

    for (name, obj) in font_dict.iter() {
        let Some(font) = doc.dereference(obj).ok().and_then(|(_, o)| o.as_dict().ok()) else {
            continue;
        };
        let cmap = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| doc.dereference(obj).ok())
            .and_then(|(_, obj)| obj.as_stream().ok())
            .map(|stream| {
                stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone())
            });
        let map = cmap.map(|bytes| CodeMap::parse(&bytes)).unwrap_or_default();
        fonts.insert(name.clone(), map);
    }
    fonts
}

/// Text shown on each page, one line per text object.
///
/// Strings are decoded through each font's ToUnicode map, so the result
/// is the text as written, whichever glyphs were available to draw it.
pub fn page_text(pdf: &[u8]) -> Result<Vec<String>> {
    let doc = Document::load_mem(pdf)?;
    let mut pages = Vec::new();

    for (_, page_id) in doc.get_pages() {
        let fonts = page_fonts(&doc, page_id);
        let fallback = CodeMap::default();
        let content = Content::decode(&doc.get_page_content(page_id)?)?;

        let mut current = &fallback;
        let mut lines = Vec::new();
        let mut line = String::new();
        for op in &content.operations {
            match op.operator.as_str() {
                "Tf" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        current = fonts.get(name).unwrap_or(&fallback);
                    }
                }
                "Tj" | "'" | "\"" => {
                    if let Some(Object::String(bytes, _)) = op.operands.last() {
                        line.push_str(&current.decode(bytes));
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(parts)) = op.operands.first() {
                        for part in parts {
                            if let Object::String(bytes, _) = part {
                                line.push_str(&current.decode(bytes));
                            }
                        }
                    }
                }
                "ET" => {
                    if !line.is_empty() {
                        lines.push(std::mem::take(&mut line));
                    }
                }
                _ => {}
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
        pages.push(lines.join("\n"));
    }
    Ok(pages)
}
