//! Text extent measurement for label layout.
//!
//! Widths come from real font metrics when a face for the requested family
//! can be resolved through the system font database; otherwise
//! [measure_label] falls back to an average-advance approximation so layout
//! stays total in fontless environments.

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::Face;

/// Average glyph advance as a fraction of the font size, used when no face
/// resolves.
const FALLBACK_ADVANCE: f32 = 0.56;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Width of `text` using real font metrics, or `None` when no face matches
/// `font_family`.
pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    guard.measure(text, font_size, font_family)
}

/// Width of `text` with the average-advance fallback applied, so the result
/// is always defined.
pub fn measure_label(text: &str, font_size: f32, font_family: &str) -> f32 {
    measure_text_width(text, font_size, font_family)
        .unwrap_or_else(|| text.chars().count() as f32 * font_size * FALLBACK_ADVANCE)
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<String, Option<FontFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str) -> Option<f32> {
        let key = family_key(font_family);
        if !self.cache.contains_key(&key) {
            let face = self.load_face(font_family);
            self.cache.insert(key.clone(), face);
        }
        let face = self.cache.get_mut(&key).and_then(|face| face.as_mut())?;
        face.measure_width(text, font_size)
    }

    fn load_face(&mut self, font_family: &str) -> Option<FontFace> {
        let mut names: Vec<String> = Vec::new();
        let mut slots: Vec<Option<Family<'static>>> = Vec::new();
        for part in font_family.split(',') {
            let raw = part.trim().trim_matches('"').trim_matches('\'');
            if raw.is_empty() {
                continue;
            }
            match raw.to_ascii_lowercase().as_str() {
                "serif" => slots.push(Some(Family::Serif)),
                "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => {
                    slots.push(Some(Family::SansSerif))
                }
                "monospace" | "ui-monospace" => slots.push(Some(Family::Monospace)),
                "cursive" => slots.push(Some(Family::Cursive)),
                "fantasy" => slots.push(Some(Family::Fantasy)),
                _ => {
                    names.push(raw.to_string());
                    slots.push(None);
                }
            }
        }
        let mut name_iter = names.iter();
        let mut families: Vec<Family<'_>> = slots
            .into_iter()
            .map(|slot| match slot {
                Some(family) => family,
                None => Family::Name(name_iter.next().expect("one name per empty slot")),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        let mut loaded: Option<FontFace> = None;
        self.db.with_face_data(id, |data, index| {
            let bytes = data.to_vec();
            if let Ok(face) = Face::parse(&bytes, index) {
                let units_per_em = face.units_per_em().max(1);
                loaded = Some(FontFace::new(bytes, index, units_per_em));
            }
        });
        loaded
    }
}

struct FontFace {
    _data: Vec<u8>,
    units_per_em: u16,
    face: Option<Face<'static>>,
    ascii_advances: Option<[u16; 128]>,
    advance_cache: HashMap<char, Option<u16>>,
}

impl FontFace {
    fn new(data: Vec<u8>, index: u32, units_per_em: u16) -> Self {
        // The face borrows from `_data`, which lives exactly as long as the
        // face inside this struct.
        let face = Face::parse(&data, index)
            .ok()
            .map(|parsed| unsafe { std::mem::transmute::<Face<'_>, Face<'static>>(parsed) });
        let ascii_advances = face.as_ref().map(|parsed| {
            let mut advances = [0u16; 128];
            for byte in 0u8..=127 {
                if let Some(glyph) = parsed.glyph_index(byte as char) {
                    advances[byte as usize] = parsed.glyph_hor_advance(glyph).unwrap_or(0);
                }
            }
            advances
        });
        Self {
            _data: data,
            units_per_em,
            face,
            ascii_advances,
            advance_cache: HashMap::new(),
        }
    }

    fn measure_width(&mut self, text: &str, font_size: f32) -> Option<f32> {
        let scale = font_size / self.units_per_em as f32;
        let fallback = font_size * FALLBACK_ADVANCE;

        if text.is_ascii()
            && let Some(advances) = &self.ascii_advances
        {
            let mut width = 0.0f32;
            for byte in text.as_bytes() {
                let advance = advances[*byte as usize];
                if advance == 0 {
                    width += fallback;
                } else {
                    width += advance as f32 * scale;
                }
            }
            return Some(width.max(0.0));
        }

        let face = self.face.as_ref()?;
        let mut width = 0.0f32;
        for ch in text.chars() {
            let advance = match self.advance_cache.get(&ch) {
                Some(cached) => *cached,
                None => {
                    let advance = face.glyph_index(ch).and_then(|id| face.glyph_hor_advance(id));
                    self.advance_cache.insert(ch, advance);
                    advance
                }
            };
            match advance {
                Some(units) => width += units as f32 * scale,
                None => width += fallback,
            }
        }
        Some(width.max(0.0))
    }
}

fn family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_wide() {
        assert_eq!(measure_text_width("", 12.0, "sans-serif"), Some(0.0));
        assert_eq!(measure_label("", 12.0, "sans-serif"), 0.0);
    }

    #[test]
    fn fallback_scales_with_length_and_size() {
        let short = measure_label("AB", 12.0, "no-such-family");
        let long = measure_label("ABCD", 12.0, "no-such-family");
        assert!(long >= short);
        let big = measure_label("AB", 24.0, "no-such-family");
        assert!(big >= short);
    }
}
