//! TrueType subsetting for embedding.
//!
//! Glyph ids are preserved: unused glyphs keep their slot in `loca` but lose
//! their outline, so content streams can address the original ids. Only the
//! tables a PDF renderer reads are kept.

use crate::error::{CertificadoError, Result};
use std::collections::BTreeSet;

// Sorted by tag, as the table directory requires
const KEPT_TABLES: [&[u8; 4]; 11] = [
    b"OS/2", b"cmap", b"cvt ", b"fpgm", b"glyf", b"head", b"hhea", b"hmtx", b"loca", b"maxp",
    b"prep",
];

const REQUIRED_TABLES: [&[u8; 4]; 6] = [b"glyf", b"head", b"hhea", b"hmtx", b"loca", b"maxp"];

// Composite glyph flags
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

fn malformed(what: &str) -> CertificadoError {
    CertificadoError::Conversion(format!("malformed font: {}", what))
}

fn read_u16(data: &[u8], at: usize) -> Result<u16> {
    data.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| malformed("truncated data"))
}

fn read_u32(data: &[u8], at: usize) -> Result<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| malformed("truncated data"))
}

struct TableDirectory<'a> {
    data: &'a [u8],
    records: Vec<([u8; 4], usize, usize)>,
}

impl<'a> TableDirectory<'a> {
    fn parse(data: &'a [u8]) -> Result<Self> {
        let count = read_u16(data, 4)? as usize;
        let mut records = Vec::with_capacity(count);
        for i in 0..count {
            let at = 12 + 16 * i;
            let tag = data
                .get(at..at + 4)
                .ok_or_else(|| malformed("truncated table directory"))?;
            let offset = read_u32(data, at + 8)? as usize;
            let length = read_u32(data, at + 12)? as usize;
            if offset.checked_add(length).map_or(true, |end| end > data.len()) {
                return Err(malformed("table outside the file"));
            }
            records.push(([tag[0], tag[1], tag[2], tag[3]], offset, length));
        }
        Ok(Self { data, records })
    }

    fn table(&self, tag: &[u8; 4]) -> Option<&'a [u8]> {
        self.records
            .iter()
            .find(|(t, _, _)| t == tag)
            .map(|&(_, offset, length)| &self.data[offset..offset + length])
    }
}

/// Glyph outline byte ranges from `loca`
fn glyph_offsets(loca: &[u8], long: bool, num_glyphs: usize) -> Result<Vec<usize>> {
    (0..=num_glyphs)
        .map(|i| {
            if long {
                read_u32(loca, i * 4).map(|v| v as usize)
            } else {
                read_u16(loca, i * 2).map(|v| v as usize * 2)
            }
        })
        .collect()
}

fn outline<'g>(glyf: &'g [u8], offsets: &[usize], gid: usize) -> Result<&'g [u8]> {
    let (start, end) = (offsets[gid], offsets[gid + 1]);
    glyf.get(start..end)
        .ok_or_else(|| malformed("glyph outside glyf"))
}

/// Glyph ids a composite glyph is assembled from
fn components(glyph: &[u8]) -> Result<Vec<u16>> {
    let mut found = Vec::new();
    if glyph.len() < 10 || (read_u16(glyph, 0)? as i16) >= 0 {
        return Ok(found);
    }
    let mut at = 10;
    loop {
        let flags = read_u16(glyph, at)?;
        found.push(read_u16(glyph, at + 2)?);
        at += 4;
        at += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            at += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            at += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            at += 8;
        }
        if flags & MORE_COMPONENTS == 0 {
            return Ok(found);
        }
    }
}

fn checksum(table: &[u8]) -> u32 {
    table.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

fn pad4(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

/// A copy of `font` whose outlines are limited to `glyphs` and the glyphs
/// they reference. Glyph 0 is always kept.
pub fn subset(font: &[u8], glyphs: &BTreeSet<u16>) -> Result<Vec<u8>> {
    let dir = TableDirectory::parse(font)?;
    for tag in REQUIRED_TABLES {
        if dir.table(tag).is_none() {
            return Err(malformed(&format!(
                "missing {} table",
                String::from_utf8_lossy(tag)
            )));
        }
    }
    let table = |tag: &[u8; 4]| dir.table(tag).ok_or_else(|| malformed("missing table"));
    let head = table(b"head")?;
    let glyf = table(b"glyf")?;
    let num_glyphs = read_u16(table(b"maxp")?, 4)? as usize;
    let long_loca = read_u16(head, 50)? != 0;
    let offsets = glyph_offsets(table(b"loca")?, long_loca, num_glyphs)?;

    // Close over composite references
    let mut keep = vec![false; num_glyphs];
    let mut pending: Vec<u16> = glyphs.iter().copied().chain([0]).collect();
    while let Some(gid) = pending.pop() {
        let gid = gid as usize;
        if gid >= num_glyphs || keep[gid] {
            continue;
        }
        keep[gid] = true;
        pending.extend(components(outline(glyf, &offsets, gid)?)?);
    }

    let mut new_glyf = Vec::new();
    let mut new_loca = Vec::with_capacity((num_glyphs + 1) * 4);
    for (gid, &kept) in keep.iter().enumerate() {
        new_loca.extend_from_slice(&(new_glyf.len() as u32).to_be_bytes());
        if kept {
            new_glyf.extend_from_slice(outline(glyf, &offsets, gid)?);
            pad4(&mut new_glyf);
        }
    }
    new_loca.extend_from_slice(&(new_glyf.len() as u32).to_be_bytes());

    // Long loca offsets; checkSumAdjustment is filled in at the end
    let mut new_head = head.to_vec();
    new_head[8..12].copy_from_slice(&[0; 4]);
    new_head[50..52].copy_from_slice(&1u16.to_be_bytes());

    let tables: Vec<(&[u8; 4], Vec<u8>)> = KEPT_TABLES
        .iter()
        .filter_map(|&tag| {
            let body = match tag {
                b"glyf" => new_glyf.clone(),
                b"loca" => new_loca.clone(),
                b"head" => new_head.clone(),
                _ => dir.table(tag)?.to_vec(),
            };
            Some((tag, body))
        })
        .collect();

    let count = tables.len() as u16;
    let mut entry_selector = 0u16;
    while (2u16 << entry_selector) <= count {
        entry_selector += 1;
    }
    let search_range = (1u16 << entry_selector) * 16;

    let mut out = Vec::new();
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&count.to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&(count * 16 - search_range).to_be_bytes());

    let mut offset = 12 + 16 * tables.len();
    let mut head_offset = 0;
    for (tag, body) in &tables {
        if *tag == b"head" {
            head_offset = offset;
        }
        out.extend_from_slice(*tag);
        out.extend_from_slice(&checksum(body).to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        offset += (body.len() + 3) / 4 * 4;
    }
    for (_, body) in &tables {
        out.extend_from_slice(body);
        pad4(&mut out);
    }

    let adjustment = 0xB1B0_AFBAu32.wrapping_sub(checksum(&out));
    out[head_offset + 8..head_offset + 12].copy_from_slice(&adjustment.to_be_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttf_parser::{Face, GlyphId};

    const DEJAVU: &[u8] = include_bytes!("../../fonts/DejaVuSans.ttf");

    fn gid(face: &Face, c: char) -> u16 {
        face.glyph_index(c).unwrap().0
    }

    #[test]
    fn test_subset_keeps_requested_outlines() {
        let original = Face::parse(DEJAVU, 0).unwrap();
        let wanted: BTreeSet<u16> = "Ana".chars().map(|c| gid(&original, c)).collect();

        let bytes = subset(DEJAVU, &wanted).unwrap();
        assert!(bytes.len() < DEJAVU.len() / 4);

        let face = Face::parse(&bytes, 0).unwrap();
        assert_eq!(face.number_of_glyphs(), original.number_of_glyphs());
        assert_eq!(face.units_per_em(), original.units_per_em());
        for c in ['A', 'n', 'a'] {
            let g = GlyphId(gid(&original, c));
            assert!(face.glyph_bounding_box(g).is_some(), "outline lost for {c}");
            assert_eq!(face.glyph_hor_advance(g), original.glyph_hor_advance(g));
        }
        let dropped = GlyphId(gid(&original, 'Z'));
        assert!(face.glyph_bounding_box(dropped).is_none());
    }

    #[test]
    fn test_composite_glyphs_pull_in_components() {
        let dir = TableDirectory::parse(DEJAVU).unwrap();
        let glyf = dir.table(b"glyf").unwrap();
        let n = read_u16(dir.table(b"maxp").unwrap(), 4).unwrap() as usize;
        let long = read_u16(dir.table(b"head").unwrap(), 50).unwrap() != 0;
        let offsets = glyph_offsets(dir.table(b"loca").unwrap(), long, n).unwrap();

        let (composite, parts) = (0..n)
            .find_map(|g| {
                let parts = components(outline(glyf, &offsets, g).unwrap()).unwrap();
                (!parts.is_empty()).then_some((g as u16, parts))
            })
            .expect("font has composite glyphs");

        let bytes = subset(DEJAVU, &BTreeSet::from([composite])).unwrap();
        let face = Face::parse(&bytes, 0).unwrap();
        assert!(face.glyph_bounding_box(GlyphId(composite)).is_some());
        for part in parts {
            assert!(face.glyph_bounding_box(GlyphId(part)).is_some());
        }
    }

    #[test]
    fn test_table_checksums_are_consistent() {
        let bytes = subset(DEJAVU, &BTreeSet::new()).unwrap();
        assert_eq!(checksum(&bytes), 0xB1B0_AFBA);

        let dir = TableDirectory::parse(&bytes).unwrap();
        let tags: Vec<[u8; 4]> = dir.records.iter().map(|(t, _, _)| *t).collect();
        let mut sorted = tags.clone();
        sorted.sort();
        assert_eq!(tags, sorted);
        assert!(dir.table(b"GPOS").is_none());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(subset(b"nope", &BTreeSet::new()).is_err());
    }
}
