//! Embedded TrueType faces, glyph metrics and per-character fallback.
//!
//! The four DejaVu Sans faces are compiled into the binary. TrueType files
//! placed in the assets `fonts/` directory are consulted, in file name
//! order, for characters the styled face has no glyph for. Metrics are
//! expressed in 1/1000 em, the unit PDF width arrays use.

use crate::error::{CertificadoError, Result};
use log::{debug, warn};
use std::borrow::Cow;
use std::path::Path;
use ttf_parser::{Face, GlyphId};

/// Directory inside the assets directory holding fallback fonts
pub const FONT_DIR: &str = "fonts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontFace {
    Regular,
    Bold,
    Oblique,
    BoldOblique,
}

impl FontFace {
    pub fn select(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FontFace::Regular,
            (true, false) => FontFace::Bold,
            (false, true) => FontFace::Oblique,
            (true, true) => FontFace::BoldOblique,
        }
    }

    pub const ALL: [FontFace; 4] = [
        FontFace::Regular,
        FontFace::Bold,
        FontFace::Oblique,
        FontFace::BoldOblique,
    ];

    /// Position of the face in every [`FontBook`]
    pub fn id(self) -> FontId {
        self as FontId
    }

    fn postscript_name(self) -> &'static str {
        match self {
            FontFace::Regular => "DejaVuSans",
            FontFace::Bold => "DejaVuSans-Bold",
            FontFace::Oblique => "DejaVuSans-Oblique",
            FontFace::BoldOblique => "DejaVuSans-BoldOblique",
        }
    }

    fn program(self) -> &'static [u8] {
        match self {
            FontFace::Regular => include_bytes!("../../fonts/DejaVuSans.ttf"),
            FontFace::Bold => include_bytes!("../../fonts/DejaVuSans-Bold.ttf"),
            FontFace::Oblique => include_bytes!("../../fonts/DejaVuSans-Oblique.ttf"),
            FontFace::BoldOblique => include_bytes!("../../fonts/DejaVuSans-BoldOblique.ttf"),
        }
    }
}

/// Index of a font inside a [`FontBook`]
pub type FontId = usize;

struct FontSource {
    name: String,
    data: Cow<'static, [u8]>,
}

/// Font programs available to a document, built-in faces first
pub struct FontSources {
    fonts: Vec<FontSource>,
}

impl FontSources {
    pub fn builtin() -> Self {
        let fonts = FontFace::ALL
            .iter()
            .map(|face| FontSource {
                name: face.postscript_name().to_string(),
                data: Cow::Borrowed(face.program()),
            })
            .collect();
        Self { fonts }
    }

    /// Built-in faces plus every TrueType file in `dir`.
    ///
    /// A missing directory adds nothing. Files that are not TrueType
    /// outline fonts are skipped with a warning.
    pub fn with_fallbacks(dir: &Path) -> Result<Self> {
        let mut sources = Self::builtin();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sources),
            Err(source) => {
                return Err(CertificadoError::AssetRead {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("ttf"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        for path in paths {
            let data = std::fs::read(&path).map_err(|source| CertificadoError::AssetRead {
                path: path.clone(),
                source,
            })?;
            let usable = Face::parse(&data, 0)
                .map(|face| face.tables().glyf.is_some())
                .unwrap_or(false);
            if !usable {
                warn!("Skipping {}: not a TrueType outline font", path.display());
                continue;
            }

            let name = path
                .file_stem()
                .map(|stem| pdf_name(&stem.to_string_lossy()))
                .unwrap_or_else(|| format!("Fallback{}", sources.fonts.len()));
            debug!("Fallback font: {}", path.display());
            sources.fonts.push(FontSource {
                name,
                data: Cow::Owned(data),
            });
        }
        Ok(sources)
    }
}

/// Keeps only characters allowed unescaped in a PDF name
fn pdf_name(raw: &str) -> String {
    let name: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if name.is_empty() {
        "Fallback".to_string()
    } else {
        name
    }
}

/// A parsed font program
pub struct Font<'a> {
    name: &'a str,
    data: &'a [u8],
    face: Face<'a>,
    scale: f32,
}

impl<'a> Font<'a> {
    fn parse(source: &'a FontSource) -> Result<Self> {
        let face = Face::parse(&source.data, 0).map_err(|e| {
            CertificadoError::Conversion(format!("cannot parse font {}: {}", source.name, e))
        })?;
        let scale = 1000.0 / face.units_per_em().max(1) as f32;
        Ok(Self {
            name: &source.name,
            data: &source.data,
            face,
            scale,
        })
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// The raw TrueType program
    pub fn data(&self) -> &[u8] {
        self.data
    }

    pub fn glyph(&self, c: char) -> Option<u16> {
        self.face.glyph_index(c).map(|g| g.0)
    }

    /// Advance of glyph `gid` in 1/1000 em
    pub fn advance_of(&self, gid: u16) -> f32 {
        self.face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0) as f32 * self.scale
    }

    /// Advance of `c`, or of the missing-glyph box when the font lacks it
    pub fn advance(&self, c: char) -> f32 {
        self.advance_of(self.glyph(c).unwrap_or(0))
    }

    pub fn ascent(&self) -> f32 {
        self.face.ascender() as f32 * self.scale
    }

    pub fn descent(&self) -> f32 {
        self.face.descender() as f32 * self.scale
    }

    pub fn cap_height(&self) -> f32 {
        self.face
            .capital_height()
            .map(|h| h as f32 * self.scale)
            .unwrap_or_else(|| self.ascent())
    }

    /// `[x_min, y_min, x_max, y_max]`
    pub fn bbox(&self) -> [f32; 4] {
        let rect = self.face.global_bounding_box();
        [
            rect.x_min as f32 * self.scale,
            rect.y_min as f32 * self.scale,
            rect.x_max as f32 * self.scale,
            rect.y_max as f32 * self.scale,
        ]
    }

    pub fn is_italic(&self) -> bool {
        self.face.is_italic() || self.face.is_oblique()
    }
}

/// A run of characters drawn with one font
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub font: FontId,
    pub text: String,
}

/// Parsed fonts for one document.
///
/// Ids `0..4` are the built-in faces in [`FontFace::ALL`] order, fallbacks
/// follow.
pub struct FontBook<'a> {
    fonts: Vec<Font<'a>>,
}

impl<'a> FontBook<'a> {
    pub fn new(sources: &'a FontSources) -> Result<Self> {
        let fonts = sources
            .fonts
            .iter()
            .map(Font::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fonts })
    }

    pub fn font(&self, id: FontId) -> &Font<'a> {
        &self.fonts[id]
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Font drawing `c` in text styled as `face`.
    ///
    /// The styled face wins whenever it has the glyph. Otherwise the first
    /// fallback that has it, and failing that the styled face again.
    pub fn resolve(&self, face: FontFace, c: char) -> FontId {
        let primary = face.id();
        if c.is_whitespace() || self.fonts[primary].glyph(c).is_some() {
            return primary;
        }
        (FontFace::ALL.len()..self.fonts.len())
            .find(|&id| self.fonts[id].glyph(c).is_some())
            .unwrap_or(primary)
    }

    /// Splits `text` into maximal runs sharing a font
    pub fn runs(&self, face: FontFace, text: &str) -> Vec<TextRun> {
        let mut runs: Vec<TextRun> = Vec::new();
        for c in text.chars() {
            let font = self.resolve(face, c);
            match runs.last_mut() {
                Some(run) if run.font == font => run.text.push(c),
                _ => runs.push(TextRun {
                    font,
                    text: c.to_string(),
                }),
            }
        }
        runs
    }

    /// Width of `text` in points at `size`
    pub fn text_width(&self, face: FontFace, text: &str, size: f32) -> f32 {
        let units: f32 = text
            .chars()
            .map(|c| self.fonts[self.resolve(face, c)].advance(c))
            .sum();
        units * size / 1000.0
    }

    /// Ascender of the styled face as a fraction of the font size
    pub fn ascent(&self, face: FontFace) -> f32 {
        self.fonts[face.id()].ascent() / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_faces_parse() {
        let sources = FontSources::builtin();
        let book = FontBook::new(&sources).unwrap();
        assert_eq!(book.len(), 4);
        assert_eq!(book.font(FontFace::Bold.id()).name(), "DejaVuSans-Bold");
        assert!(book.font(FontFace::Oblique.id()).is_italic());
        assert!(!book.font(FontFace::Regular.id()).is_italic());
    }

    #[test]
    fn test_widths_come_from_the_font() {
        let sources = FontSources::builtin();
        let book = FontBook::new(&sources).unwrap();
        let regular = book.font(FontFace::Regular.id());

        let gid = regular.glyph('A').unwrap();
        assert!(gid > 0);
        assert!(regular.advance('A') > 500.0 && regular.advance('A') < 800.0);

        let w = book.text_width(FontFace::Regular, "AA", 10.0);
        assert!((w - 2.0 * regular.advance('A') / 100.0).abs() < 0.001);
        assert!(book.text_width(FontFace::Bold, "m", 10.0) > book.text_width(FontFace::Regular, "m", 10.0));
    }

    #[test]
    fn test_latin_extended_and_vietnamese_have_glyphs() {
        let sources = FontSources::builtin();
        let book = FontBook::new(&sources).unwrap();
        for c in "Łukasz Żółć Ngô Bảo Châu".chars().filter(|c| !c.is_whitespace()) {
            assert!(book.font(0).glyph(c).is_some(), "missing glyph for {c}");
        }
    }

    #[test]
    fn test_uncovered_characters_stay_on_the_styled_face() {
        let sources = FontSources::builtin();
        let book = FontBook::new(&sources).unwrap();
        assert_eq!(book.resolve(FontFace::Bold, '年'), FontFace::Bold.id());
        assert_eq!(
            book.runs(FontFace::Regular, "2024年"),
            vec![TextRun {
                font: 0,
                text: "2024年".to_string()
            }]
        );
    }

    #[test]
    fn test_fallback_dir_loads_only_truetype_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("extra.ttf"), FontFace::Bold.program()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        std::fs::write(dir.path().join("broken.ttf"), b"not a font").unwrap();

        let sources = FontSources::with_fallbacks(dir.path()).unwrap();
        let book = FontBook::new(&sources).unwrap();
        assert_eq!(book.len(), 5);
        assert_eq!(book.font(4).name(), "extra");
    }

    #[test]
    fn test_missing_font_dir_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let sources = FontSources::with_fallbacks(&dir.path().join(FONT_DIR)).unwrap();
        assert_eq!(FontBook::new(&sources).unwrap().len(), 4);
    }

    #[test]
    fn test_face_selection() {
        assert_eq!(FontFace::select(true, true), FontFace::BoldOblique);
        assert_eq!(FontFace::select(false, false).id(), 0);
        assert_eq!(FontFace::Oblique.id(), 2);
    }

    #[test]
    fn test_pdf_names_are_sanitized() {
        assert_eq!(pdf_name("Noto Sans (CJK)"), "NotoSansCJK");
        assert_eq!(pdf_name("字体"), "Fallback");
    }
}
