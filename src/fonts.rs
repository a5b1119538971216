use std::collections::{HashMap, HashSet};

use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

use crate::error::Error;
use crate::model::{FontRefs, FontStyle};

/// Raw font file bytes keyed by the reference string used in `LayoutConfig`.
pub type FontBytes = HashMap<String, Vec<u8>>;

/// Text measurement at a given font size, in points.
pub trait Measure {
    fn text_width(&self, text: &str, font_size: f32) -> f32;

    /// Ascent as a fraction of the font size, used to place baselines.
    fn ascender_ratio(&self) -> f32 {
        0.75
    }
}

enum FaceKind {
    /// One of the standard 14 Type1 fonts, WinAnsi encoded.
    Builtin {
        base_font: &'static str,
        widths_1000: Vec<f32>,
    },
    TrueType {
        data: Vec<u8>,
        char_widths_1000: HashMap<char, f32>,
        missing_width_1000: f32,
    },
}

pub struct FontFace {
    name: String,
    kind: FaceKind,
    ascender_ratio: f32,
}

impl FontFace {
    pub fn builtin(style: FontStyle) -> Self {
        let (base_font, widths_1000) = match style {
            FontStyle::Regular => ("Helvetica", helvetica_widths()),
            FontStyle::Bold => ("Helvetica-Bold", helvetica_bold_widths()),
        };
        Self {
            name: base_font.to_string(),
            kind: FaceKind::Builtin {
                base_font,
                widths_1000,
            },
            ascender_ratio: 0.718,
        }
    }

    /// Parse a TrueType/OpenType face and cache the advance width of every
    /// code point in its Unicode cmap subtables.
    pub fn from_bytes(name: &str, data: Vec<u8>) -> Result<Self, Error> {
        let face = Face::parse(&data, 0)
            .map_err(|e| Error::Font(format!("cannot parse font `{name}`: {e}")))?;
        let units = face.units_per_em() as f32;
        let advance = |gid| {
            face.glyph_hor_advance(gid)
                .map(|adv| adv as f32 / units * 1000.0)
                .unwrap_or(0.0)
        };

        let mut char_widths_1000 = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|cp| {
                    if let Some(ch) = char::from_u32(cp)
                        && let Some(gid) = subtable.glyph_index(cp)
                    {
                        char_widths_1000.entry(ch).or_insert_with(|| advance(gid));
                    }
                });
            }
        }
        if char_widths_1000.is_empty() {
            return Err(Error::Font(format!("font `{name}` has no Unicode cmap")));
        }
        let missing_width_1000 = advance(ttf_parser::GlyphId(0));
        let ascender_ratio = face.ascender() as f32 / units;

        log::debug!(
            "Parsed font {name}: {} code points, ascender_ratio={ascender_ratio:.3}",
            char_widths_1000.len()
        );

        Ok(Self {
            name: name.to_string(),
            kind: FaceKind::TrueType {
                data,
                char_widths_1000,
                missing_width_1000,
            },
            ascender_ratio,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, FaceKind::Builtin { .. })
    }

    /// Width of a single character in 1000-units.
    fn char_width_1000(&self, ch: char) -> f32 {
        match &self.kind {
            FaceKind::Builtin { widths_1000, .. } => {
                let byte = char_to_winansi(ch);
                if byte >= 32 {
                    widths_1000[(byte - 32) as usize]
                } else {
                    0.0
                }
            }
            FaceKind::TrueType {
                char_widths_1000,
                missing_width_1000,
                ..
            } => char_widths_1000
                .get(&ch)
                .copied()
                .unwrap_or(*missing_width_1000),
        }
    }
}

impl Measure for FontFace {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars()
            .map(|ch| self.char_width_1000(ch) * font_size / 1000.0)
            .sum()
    }

    fn ascender_ratio(&self) -> f32 {
        self.ascender_ratio
    }
}

/// The regular and bold faces of one layout, parsed once and shared
/// read-only by every render.
pub struct Fonts {
    regular: FontFace,
    bold: FontFace,
}

impl Fonts {
    pub fn builtin() -> Self {
        Self {
            regular: FontFace::builtin(FontStyle::Regular),
            bold: FontFace::builtin(FontStyle::Bold),
        }
    }

    /// Load the faces named in `refs`. A named face with no bytes, or bytes
    /// that do not parse, is a configuration error.
    pub fn load(refs: &FontRefs, bytes: &FontBytes) -> Result<Self, Error> {
        let load_one = |reference: Option<&str>, style: FontStyle| -> Result<FontFace, Error> {
            let Some(reference) = reference else {
                return Ok(FontFace::builtin(style));
            };
            let data = bytes.get(reference).ok_or_else(|| {
                Error::Font(format!("no font bytes supplied for `{reference}`"))
            })?;
            FontFace::from_bytes(reference, data.clone())
        };
        Ok(Self {
            regular: load_one(refs.regular.as_deref(), FontStyle::Regular)?,
            bold: load_one(refs.bold.as_deref(), FontStyle::Bold)?,
        })
    }

    pub fn face(&self, style: FontStyle) -> &FontFace {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
        }
    }
}

pub(crate) fn pdf_font_name(style: FontStyle) -> &'static str {
    match style {
        FontStyle::Regular => "F1",
        FontStyle::Bold => "F2",
    }
}

/// A face written into the PDF, ready to encode content-stream text.
pub(crate) struct EmbeddedFont {
    pub(crate) font_ref: Ref,
    char_to_gid: Option<HashMap<char, u16>>,
}

impl EmbeddedFont {
    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.char_to_gid {
            Some(map) => encode_as_gids(text, map),
            None => to_winansi_bytes(text),
        }
    }
}

pub(crate) fn embed_font(
    pdf: &mut Pdf,
    face: &FontFace,
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Result<EmbeddedFont, Error> {
    let t0 = std::time::Instant::now();
    let font_ref = alloc();
    let embedded = match &face.kind {
        FaceKind::Builtin { base_font, .. } => {
            pdf.type1_font(font_ref)
                .base_font(Name(base_font.as_bytes()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
            EmbeddedFont {
                font_ref,
                char_to_gid: None,
            }
        }
        FaceKind::TrueType { data, .. } => {
            let char_to_gid = embed_truetype(pdf, font_ref, &face.name, data, used_chars, alloc)?;
            EmbeddedFont {
                font_ref,
                char_to_gid: Some(char_to_gid),
            }
        }
    };
    log::debug!(
        "embed_font: {} ({} chars) → {:.1}ms",
        face.name,
        used_chars.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(embedded)
}

/// Embed a TrueType/OpenType font as a CIDFont (Type0 composite) with Identity-H encoding.
/// The font data is subsetted to only include glyphs used in the document.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    font_name: &str,
    font_data: &[u8],
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Result<HashMap<char, u16>, Error> {
    let face = Face::parse(font_data, 0)
        .map_err(|e| Error::Font(format!("cannot parse font `{font_name}`: {e}")))?;
    let descriptor_ref = alloc();
    let data_ref = alloc();

    let units = face.units_per_em() as f32;
    let ascent = face.ascender() as f32 / units * 1000.0;
    let descent = face.descender() as f32 / units * 1000.0;
    let cap_height = face
        .capital_height()
        .map(|h| h as f32 / units * 1000.0)
        .unwrap_or(700.0);

    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        bb.x_min as f32 / units * 1000.0,
        bb.y_min as f32 / units * 1000.0,
        bb.x_max as f32 / units * 1000.0,
        bb.y_max as f32 / units * 1000.0,
    );

    // Sorted so glyph ids come out the same on every run.
    let mut chars: Vec<char> = used_chars.iter().copied().collect();
    chars.sort_unstable();

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut glyphs: Vec<(char, u16, u16, f32)> = Vec::new();
    for ch in chars {
        if let Some(gid) = face.glyph_index(ch) {
            let w = face
                .glyph_hor_advance(gid)
                .map(|adv| adv as f32 / units * 1000.0)
                .unwrap_or(0.0);
            glyphs.push((ch, gid.0, remapper.remap(gid.0), w));
        }
    }

    // A full font keeps its own glyph ids.
    let (subset_data, subsetted) = match subsetter::subset(font_data, 0, &remapper) {
        Ok(data) => (data, true),
        Err(e) => {
            log::warn!("Font subsetting failed for {font_name}: {e}; embedding full font");
            (font_data.to_vec(), false)
        }
    };
    let gid_of = |old: u16, new: u16| if subsetted { new } else { old };
    let char_to_gid: HashMap<char, u16> = glyphs
        .iter()
        .map(|&(ch, old, new, _)| (ch, gid_of(old, new)))
        .collect();
    let mut gid_widths: Vec<(u16, f32)> = glyphs
        .iter()
        .map(|&(_, old, new, w)| (gid_of(old, new), w))
        .collect();
    gid_widths.sort_by_key(|&(gid, _)| gid);
    gid_widths.dedup_by_key(|&mut (gid, _)| gid);

    let data_len = i32::try_from(subset_data.len())
        .map_err(|_| Error::Font(format!("font `{font_name}` is too large to embed")))?;
    pdf.stream(data_ref, &subset_data)
        .pair(Name(b"Length1"), data_len);

    let ps_name: String = font_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(font_name)
        .trim_end_matches(".ttf")
        .trim_end_matches(".otf")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();

    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(0.0)
        .ascent(ascent)
        .descent(descent)
        .cap_height(cap_height)
        .stem_v(80.0)
        .font_file2(data_ref);

    let cid_font_ref = alloc();
    let system_info = pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(ps_name.as_bytes()));
        cid.system_info(system_info);
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !gid_widths.is_empty() {
            let mut w = cid.widths();
            for &(gid, width) in &gid_widths {
                w.consecutive(gid, [width]);
            }
        }
    }

    let tounicode_ref = alloc();
    let cmap_name = format!("{ps_name}-UTF16");
    let mut cmap = pdf_writer::types::UnicodeCmap::new(
        Name(cmap_name.as_bytes()),
        pdf_writer::types::SystemInfo {
            registry: pdf_writer::Str(b"Adobe"),
            ordering: pdf_writer::Str(b"Identity"),
            supplement: 0,
        },
    );
    for (&ch, &new_gid) in &char_to_gid {
        cmap.pair(new_gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);

    Ok(char_to_gid)
}

/// Map a single Unicode char to its WinAnsi byte, or 0 if unmappable.
fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0020..=0x007F => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => 0,
    }
}

/// Convert a UTF-8 string to WinAnsi (Windows-1252) bytes; unmappable chars are dropped.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(char_to_winansi)
        .filter(|&b| b >= 32)
        .collect()
}

/// Encode UTF-8 text as big-endian 2-byte glyph IDs for CIDFont content streams.
pub(crate) fn encode_as_gids(text: &str, char_to_gid: &HashMap<char, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        let gid = char_to_gid.get(&ch).copied().unwrap_or(0);
        out.push((gid >> 8) as u8);
        out.push((gid & 0xFF) as u8);
    }
    out
}

/// Approximate Helvetica widths at 1000 units/em for WinAnsi chars 32..=255.
fn helvetica_widths() -> Vec<f32> {
    (32u8..=255u8)
        .map(|b| match b {
            32 => 278.0,                          // space
            33..=47 => 333.0,                     // punctuation
            48..=57 => 556.0,                     // digits
            58..=64 => 333.0,                     // more punctuation
            73 | 74 => 278.0,                     // I J (narrow uppercase)
            77 => 833.0,                          // M (wide)
            65..=90 => 667.0,                     // uppercase A-Z (average)
            91..=96 => 333.0,                     // brackets etc.
            102 | 105 | 106 | 108 | 116 => 278.0, // narrow lowercase: f i j l t
            109 | 119 => 833.0,                   // m w (wide)
            97..=122 => 556.0,                    // lowercase a-z (average)
            _ => 556.0,
        })
        .collect()
}

/// Approximate Helvetica-Bold widths, same layout as `helvetica_widths`.
fn helvetica_bold_widths() -> Vec<f32> {
    (32u8..=255u8)
        .map(|b| match b {
            32 => 278.0,
            33..=47 => 333.0,
            48..=57 => 556.0,
            58..=64 => 333.0,
            73 => 278.0,
            74 => 556.0,
            77 => 833.0,
            87 => 944.0,
            65..=90 => 722.0,
            91..=96 => 333.0,
            105 | 106 | 108 => 278.0,
            102 | 116 => 333.0,
            109 => 889.0,
            119 => 778.0,
            97..=122 => 611.0,
            _ => 611.0,
        })
        .collect()
}
