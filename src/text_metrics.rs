// Text extents for labels. Widths come from the glyph advances of a system
// font when one resolves, otherwise from a per-character estimate.

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::Face;

/// Line box height as a multiple of the font size.
pub const LINE_HEIGHT: f64 = 1.2;
/// Average advance of a proportional sans-serif glyph, in ems.
pub const FALLBACK_CHAR_WIDTH: f64 = 0.6;

static FONT_MEASURER: Lazy<Mutex<FontMeasurer>> = Lazy::new(|| Mutex::new(FontMeasurer::new()));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f64,
    pub height: f64,
}

/// How label text is measured.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TextMeasure {
    /// Fixed per-character estimate; identical on every machine.
    #[default]
    Heuristic,
    /// Glyph advances from the first system font matching the family list.
    System(String),
}

impl TextMeasure {
    pub fn extent(&self, text: &str, font_size: f64) -> TextExtent {
        let lines: Vec<&str> = if text.is_empty() {
            Vec::new()
        } else {
            text.split('\n').collect()
        };
        if lines.is_empty() || font_size <= 0.0 {
            return TextExtent {
                width: 0.0,
                height: 0.0,
            };
        }
        let width = lines
            .iter()
            .map(|line| self.line_width(line, font_size))
            .fold(0.0_f64, f64::max);
        TextExtent {
            width,
            height: lines.len() as f64 * font_size * LINE_HEIGHT,
        }
    }

    fn line_width(&self, line: &str, font_size: f64) -> f64 {
        match self {
            TextMeasure::Heuristic => heuristic_width(line, font_size),
            TextMeasure::System(family) => measure_text_width(line, font_size, family)
                .unwrap_or_else(|| heuristic_width(line, font_size)),
        }
    }
}

pub fn heuristic_width(text: &str, font_size: f64) -> f64 {
    text.chars().count() as f64 * font_size * FALLBACK_CHAR_WIDTH
}

/// Width of a single line in a system font, `None` if no font resolves.
pub fn measure_text_width(text: &str, font_size: f64, font_family: &str) -> Option<f64> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = FONT_MEASURER.lock().ok()?;
    guard.measure(text, font_size, font_family)
}

struct FontMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    faces: HashMap<String, Option<LoadedFace>>,
}

impl FontMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f64, font_family: &str) -> Option<f64> {
        let key = font_family.trim().to_string();
        if !self.faces.contains_key(&key) {
            let face = self.load_face(font_family);
            self.faces.insert(key.clone(), face);
        }
        self.faces.get_mut(&key)?.as_mut()?.width(text, font_size)
    }

    fn load_face(&mut self, font_family: &str) -> Option<LoadedFace> {
        let names: Vec<String> = font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\'').to_string())
            .filter(|name| !name.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names
            .iter()
            .map(|name| match name.to_ascii_lowercase().as_str() {
                "serif" => Family::Serif,
                "monospace" | "ui-monospace" => Family::Monospace,
                "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => Family::SansSerif,
                _ => Family::Name(name.as_str()),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let id = self.db.query(&Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        })?;
        self.db
            .with_face_data(id, |data, index| LoadedFace::parse(data.to_vec(), index))
            .flatten()
    }
}

struct LoadedFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: f64,
    ascii_advances: [u16; 128],
    other_advances: HashMap<char, Option<u16>>,
}

impl LoadedFace {
    fn parse(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph).unwrap_or(0);
            }
        }
        let units_per_em = f64::from(face.units_per_em().max(1));
        Some(Self {
            data,
            index,
            units_per_em,
            ascii_advances,
            other_advances: HashMap::new(),
        })
    }

    fn width(&mut self, text: &str, font_size: f64) -> Option<f64> {
        let scale = font_size / self.units_per_em;
        let fallback = font_size * FALLBACK_CHAR_WIDTH;
        let mut width = 0.0;
        let mut face: Option<Face<'_>> = None;
        for ch in text.chars() {
            let advance = if ch.is_ascii() {
                Some(self.ascii_advances[ch as usize]).filter(|a| *a > 0)
            } else if let Some(cached) = self.other_advances.get(&ch) {
                *cached
            } else {
                if face.is_none() {
                    face = Face::parse(&self.data, self.index).ok();
                }
                let advance = face
                    .as_ref()
                    .and_then(|f| f.glyph_index(ch).and_then(|g| f.glyph_hor_advance(g)));
                self.other_advances.insert(ch, advance);
                advance
            };
            width += advance.map_or(fallback, |a| f64::from(a) * scale);
        }
        Some(width)
    }
}
