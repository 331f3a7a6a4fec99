use crate::error::{CertificadoError, Result};
use crate::pdf::fonts::{Font, FontBook, FontId};
use crate::pdf::images::{ImageStore, LoadedImage};
use crate::pdf::layout::{LaidOut, Placed, PlacedImage, PlacedText};
use crate::pdf::subset::subset;
use log::{debug, warn};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, BTreeSet};

const PRODUCER: &str = concat!("certificado ", env!("CARGO_PKG_VERSION"));

/// Character codes of one embedded font.
///
/// Codes are assigned per distinct character, starting at 1, so the
/// ToUnicode map recovers every character even when several of them fall
/// back to the missing glyph.
struct FontEncoding {
    codes: BTreeMap<char, u16>,
}

impl FontEncoding {
    fn new(chars: &BTreeSet<char>) -> Self {
        let codes = chars
            .iter()
            .zip(1u16..)
            .map(|(&c, code)| (c, code))
            .collect();
        Self { codes }
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .flat_map(|c| self.codes.get(&c).copied().unwrap_or(0).to_be_bytes())
            .collect()
    }
}

fn resource_name(font: FontId) -> String {
    format!("F{}", font + 1)
}

/// Serializes laid-out pages. Output depends only on the input.
pub fn write_pdf(
    laid: &LaidOut,
    images: &ImageStore,
    fonts: &FontBook,
    title: Option<&str>,
) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut used: BTreeMap<FontId, BTreeSet<char>> = BTreeMap::new();
    for page in &laid.pages {
        for item in &page.items {
            if let Placed::Text(text) = item {
                for run in &text.runs {
                    used.entry(run.font).or_default().extend(run.text.chars());
                }
            }
        }
    }

    let mut font_resources = Dictionary::new();
    let mut encodings = BTreeMap::new();
    for (&id, chars) in &used {
        let encoding = FontEncoding::new(chars);
        let font_id = embed_font(&mut doc, fonts.font(id), &encoding)?;
        font_resources.set(resource_name(id), font_id);
        encodings.insert(id, encoding);
    }

    let mut xobjects = Dictionary::new();
    for (index, image) in images.images().iter().enumerate() {
        let image_id = add_image(&mut doc, image);
        xobjects.set(LoadedImage::resource_name(index), image_id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => font_resources,
        "XObject" => xobjects,
    });

    let (width, height) = (laid.setup.width, laid.setup.height);
    let mut kids: Vec<Object> = Vec::with_capacity(laid.pages.len());
    for page in &laid.pages {
        let mut operations = Vec::new();
        for &bg in &laid.backgrounds {
            draw_image(&mut operations, bg, 0.0, 0.0, width, height);
        }
        for item in &page.items {
            match item {
                Placed::Text(text) => draw_text(&mut operations, text, &encodings, height),
                Placed::Image(image) => draw_placed_image(&mut operations, image, height),
            }
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let info_id = info_dictionary(&mut doc, title);
    doc.trailer.set("Info", info_id);

    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| CertificadoError::Conversion(format!("cannot serialize PDF: {}", e)))?;
    debug!("Wrote PDF: {} page(s), {} bytes", laid.pages.len(), bytes.len());
    Ok(bytes)
}

/// Embeds a subset of `font` as a Type0 font with Identity-H encoding
fn embed_font(doc: &mut Document, font: &Font, encoding: &FontEncoding) -> Result<ObjectId> {
    let glyphs: Vec<u16> = encoding
        .codes
        .keys()
        .map(|&c| font.glyph(c).unwrap_or(0))
        .collect();

    let missing: String = encoding
        .codes
        .keys()
        .zip(&glyphs)
        .filter(|(c, &gid)| gid == 0 && !c.is_whitespace())
        .map(|(c, _)| *c)
        .collect();
    if !missing.is_empty() {
        warn!(
            "No font has glyphs for \"{}\"; they are kept in the text layer only",
            missing
        );
    }

    let used: BTreeSet<u16> = glyphs.iter().copied().collect();
    let program = subset(font.data(), &used)?;
    let base_font = format!("{}+{}", subset_tag(font.name(), &used), font.name());
    debug!(
        "Embedding {} ({} glyphs, {} bytes)",
        base_font,
        used.len(),
        program.len()
    );

    let program_len = program.len() as i64;
    let file_id = doc.add_object(Stream::new(
        dictionary! { "Length1" => program_len },
        program,
    ));

    let italic = font.is_italic();
    // Nonsymbolic is wrong for an Identity-H font; 4 marks it symbolic
    let flags: i64 = if italic { 4 | 64 } else { 4 };
    let bbox: Vec<Object> = font.bbox().iter().map(|v| v.round().into()).collect();
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(base_font.clone().into_bytes()),
        "Flags" => flags,
        "FontBBox" => bbox,
        "ItalicAngle" => if italic { -11 } else { 0 },
        "Ascent" => font.ascent().round(),
        "Descent" => font.descent().round(),
        "CapHeight" => font.cap_height().round(),
        "StemV" => 80,
        "FontFile2" => file_id,
    });

    let mut cid_to_gid = vec![0u8, 0u8];
    let mut widths: Vec<Object> = Vec::with_capacity(glyphs.len());
    for &gid in &glyphs {
        cid_to_gid.extend_from_slice(&gid.to_be_bytes());
        widths.push(font.advance_of(gid).round().into());
    }
    let cid_to_gid_id = doc.add_object(Stream::new(dictionary! {}, cid_to_gid));

    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => Object::Name(base_font.clone().into_bytes()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => font.advance_of(0).round(),
        "W" => vec![1.into(), Object::Array(widths)],
        "CIDToGIDMap" => cid_to_gid_id,
    });

    let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, to_unicode_cmap(encoding)));

    Ok(doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(base_font.into_bytes()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        "ToUnicode" => to_unicode_id,
    }))
}

/// Six capital letters derived from the subset, as PDF subset names require
fn subset_tag(name: &str, glyphs: &BTreeSet<u16>) -> String {
    // FNV-1a
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let bytes = name.bytes().chain(glyphs.iter().flat_map(|g| g.to_be_bytes()));
    for byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (0..6)
        .map(|i| (b'A' + ((hash >> (i * 8)) % 26) as u8) as char)
        .collect()
}

fn to_unicode_cmap(encoding: &FontEncoding) -> Vec<u8> {
    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let entries: Vec<(&char, &u16)> = encoding.codes.iter().collect();
    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (c, code) in chunk {
            let mut units = [0u16; 2];
            let hex: String = c
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{:04X}", unit))
                .collect();
            out.push_str(&format!("<{:04X}> <{}>\n", code, hex));
        }
        out.push_str("endbfchar\n");
    }

    out.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    out.into_bytes()
}

/// Adds the image, with a soft mask when it carries transparency
fn add_image(doc: &mut Document, image: &LoadedImage) -> ObjectId {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    if let Some(alpha) = &image.alpha {
        let mask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha.clone(),
        ));
        dict.set("SMask", mask_id);
    }
    doc.add_object(Stream::new(dict, image.rgb.clone()))
}

fn info_dictionary(doc: &mut Document, title: Option<&str>) -> ObjectId {
    let mut info = dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
    };
    if let Some(title) = title {
        info.set("Title", text_string(title));
    }
    doc.add_object(info)
}

/// PDF text string: UTF-16BE with a byte order mark
fn text_string(text: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// One line: a single text object, switching fonts between runs
fn draw_text(
    ops: &mut Vec<Operation>,
    text: &PlacedText,
    encodings: &BTreeMap<FontId, FontEncoding>,
    page_height: f32,
) {
    let y = page_height - text.baseline;
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "rg",
        vec![text.color.0.into(), text.color.1.into(), text.color.2.into()],
    ));
    ops.push(Operation::new(
        "Td",
        vec![text.x.into(), y.into()],
    ));
    for run in &text.runs {
        let Some(encoding) = encodings.get(&run.font) else {
            continue;
        };
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(resource_name(run.font).into_bytes()), text.size.into()],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(encoding.encode(&run.text), StringFormat::Hexadecimal)],
        ));
    }
    ops.push(Operation::new("ET", vec![]));
}

fn draw_placed_image(ops: &mut Vec<Operation>, image: &PlacedImage, page_height: f32) {
    let y = page_height - image.top - image.height;
    draw_image(ops, image.image, image.x, y, image.width, image.height);
}

/// `x`/`y` are the lower-left corner in PDF user space
fn draw_image(ops: &mut Vec<Operation>, index: usize, x: f32, y: f32, width: f32, height: f32) {
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
        "cm",
        vec![width.into(), 0.into(), 0.into(), height.into(), x.into(), y.into()],
    ));
    ops.push(Operation::new(
        "Do",
        vec![Object::Name(LoadedImage::resource_name(index).into_bytes())],
    ));
    ops.push(Operation::new("Q", vec![]));
}
