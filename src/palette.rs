// ============================================================================
// BEAD COLORS & PALETTE: color values, palette-ID lookup, label contrast
// ============================================================================

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use image::Rgba;
use serde::Deserialize;

/// A bead color as stored in a grid cell.
///
/// Hex colors are parsed into an RGB triple so that `#fdfbff` and `#FDFBFF`
/// compare equal.  Anything that is not a hex color (an unknown palette ID
/// loaded from a project file) is kept verbatim so it survives a
/// load/save cycle.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BeadColor {
    Rgb([u8; 3]),
    Unresolved(Box<str>),
}

/// Reserved value for frosted (translucent white) beads.
pub const FROSTED: BeadColor = BeadColor::Rgb([0xFD, 0xFB, 0xFF]);

impl BeadColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        BeadColor::Rgb([r, g, b])
    }

    /// Parse `#RRGGBB` / `RRGGBB`.  Returns `None` for anything else.
    pub fn from_hex(text: &str) -> Option<Self> {
        let hex = text.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(BeadColor::Rgb([r, g, b]))
    }

    /// Parse a stored color string, keeping unparseable text as-is.
    pub fn parse_lossless(text: &str) -> Self {
        Self::from_hex(text).unwrap_or_else(|| BeadColor::Unresolved(text.into()))
    }

    pub fn is_frosted(&self) -> bool {
        *self == FROSTED
    }

    /// Opaque RGBA for drawing; `None` for unresolved colors.
    pub fn to_rgba(&self) -> Option<Rgba<u8>> {
        match self {
            BeadColor::Rgb([r, g, b]) => Some(Rgba([*r, *g, *b, 255])),
            BeadColor::Unresolved(_) => None,
        }
    }

    /// Black or white, whichever reads better on top of this color (YIQ).
    pub fn contrast_color(&self) -> Rgba<u8> {
        let [r, g, b] = match self {
            BeadColor::Rgb(rgb) => *rgb,
            BeadColor::Unresolved(_) => [255, 255, 255],
        };
        let yiq = (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000;
        if yiq >= 128 {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    }
}

impl fmt::Display for BeadColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeadColor::Rgb([r, g, b]) => write!(f, "#{:02X}{:02X}{:02X}", r, g, b),
            BeadColor::Unresolved(text) => f.write_str(text),
        }
    }
}

// ============================================================================
// PALETTE
// ============================================================================

/// Palette-ID ↔ color lookup tables.
///
/// Palette data comes grouped by brand/series, `{ "A": { "A1": "#FAF5CD" } }`;
/// only the flattened maps are kept.
#[derive(Clone, Debug, Default)]
pub struct Palette {
    groups: Vec<(String, Vec<String>)>,
    id_by_rgb: HashMap<[u8; 3], String>,
    rgb_by_id: HashMap<String, [u8; 3]>,
}

#[derive(Debug)]
pub enum PaletteError {
    Io(std::io::Error),
    Parse(String),
}

impl fmt::Display for PaletteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaletteError::Io(e) => write!(f, "I/O error: {}", e),
            PaletteError::Parse(e) => write!(f, "Invalid palette: {}", e),
        }
    }
}

impl From<std::io::Error> for PaletteError {
    fn from(e: std::io::Error) -> Self {
        PaletteError::Io(e)
    }
}

impl From<serde_json::Error> for PaletteError {
    fn from(e: serde_json::Error) -> Self {
        PaletteError::Parse(e.to_string())
    }
}

/// On-disk palette shape.  `serde_json`'s `preserve_order` is not enabled, so
/// groups are re-sorted by name after loading.
#[derive(Deserialize)]
#[serde(transparent)]
struct PaletteFile(HashMap<String, HashMap<String, String>>);

impl Palette {
    /// Build from `(group, [(id, hex)])` entries.  Entries whose hex does not
    /// parse are skipped.  When two IDs share a color the first one wins the
    /// reverse lookup.
    pub fn from_groups<G, E>(groups: G) -> Self
    where
        G: IntoIterator<Item = (String, E)>,
        E: IntoIterator<Item = (String, String)>,
    {
        let mut palette = Palette::default();
        for (group, entries) in groups {
            let mut ids = Vec::new();
            for (id, hex) in entries {
                let Some(BeadColor::Rgb(rgb)) = BeadColor::from_hex(&hex) else {
                    crate::log_warn!("Palette: skipping {} with bad color {:?}", id, hex);
                    continue;
                };
                palette.id_by_rgb.entry(rgb).or_insert_with(|| id.clone());
                palette.rgb_by_id.insert(id.clone(), rgb);
                ids.push(id);
            }
            ids.sort_by(|a, b| natural_cmp(a, b));
            palette.groups.push((group, ids));
        }
        palette
    }

    pub fn from_json_str(text: &str) -> Result<Self, PaletteError> {
        let file: PaletteFile = serde_json::from_str(text)?;
        let mut groups: Vec<(String, HashMap<String, String>)> = file.0.into_iter().collect();
        groups.sort_by(|a, b| natural_cmp(&a.0, &b.0));
        Ok(Self::from_groups(groups))
    }

    pub fn load(path: &Path) -> Result<Self, PaletteError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn is_empty(&self) -> bool {
        self.rgb_by_id.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rgb_by_id.len()
    }

    /// Group names with their IDs (natural order), for palette pickers.
    pub fn groups(&self) -> &[(String, Vec<String>)] {
        &self.groups
    }

    /// Palette ID of a color, if it belongs to the palette.
    pub fn color_id(&self, color: &BeadColor) -> Option<&str> {
        match color {
            BeadColor::Rgb(rgb) => self.id_by_rgb.get(rgb).map(String::as_str),
            BeadColor::Unresolved(_) => None,
        }
    }

    pub fn color_for_id(&self, id: &str) -> Option<BeadColor> {
        self.rgb_by_id.get(id).map(|rgb| BeadColor::Rgb(*rgb))
    }

    /// Text stored in a project file: the palette ID when known, otherwise
    /// the color itself.
    pub fn encode(&self, color: &BeadColor) -> String {
        match self.color_id(color) {
            Some(id) => id.to_string(),
            None => color.to_string(),
        }
    }

    /// Inverse of [`Palette::encode`].  Unknown IDs pass through unchanged.
    pub fn decode(&self, text: &str) -> BeadColor {
        match self.color_for_id(text) {
            Some(color) => color,
            None => BeadColor::parse_lossless(text),
        }
    }
}

/// Natural ordering for palette IDs: digit runs compare numerically, so
/// `A2 < A10`.  Letters compare case-insensitively.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na = take_number(&mut ai);
                let nb = take_number(&mut bi);
                match na.cmp(&nb) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
            (Some(ca), Some(cb)) => {
                match ca.to_ascii_lowercase().cmp(&cb.to_ascii_lowercase()) {
                    Ordering::Equal => {
                        ai.next();
                        bi.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

fn take_number(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut value: u64 = 0;
    while let Some(c) = it.peek().copied() {
        let Some(d) = c.to_digit(10) else { break };
        value = value.saturating_mul(10).saturating_add(d as u64);
        it.next();
    }
    value
}
