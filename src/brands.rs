//! Brand label → marker icon resolution.
//!
//! Labels coming from the station endpoint are free text ("Circle K",
//! "circle k", "ORLEN "). They are normalized before lookup so that every
//! spelling of a brand shares one icon, and resolved icons are memoized so the
//! same normalized label always yields the same `Rc<BrandIcon>`.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use log::debug;
use ratatui::style::Color;

/// Logo used for stations without a known brand.
pub const FALLBACK_LOGO: &str = "station_general.png";

/// Directory the logo files are served from.
pub const LOGO_DIR: &str = "brands_logos";

const PALETTE: [Color; 8] = [
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Cyan,
    Color::LightRed,
    Color::LightGreen,
    Color::LightMagenta,
];

/// Logos for brands known at build time; `None` means the brand has no logo yet.
const BUILTIN_LOGOS: &[(&str, Option<&str>)] = &[
    ("bp", Some("bp.png")),
    ("pieprzyk", Some("pieprzyk.png")),
    ("slovnaft", Some("slovnaft.png")),
    ("watis", Some("watis.png")),
    ("leclerc", Some("leclerc.png")),
    ("lotos", Some("lotos.png")),
    ("uniwar", Some("uniwar.png")),
    ("avia", Some("avia.png")),
    ("orlen", Some("orlen.png")),
    ("auchan", Some("auchan.png")),
    ("moya", Some("moya.png")),
    ("bliska", Some("bliska.png")),
    ("mol", Some("mol.png")),
    ("shell", Some("shell.png")),
    ("huzar", Some("huzar.png")),
    ("circle_k", Some("circle_k.png")),
    ("aral", Some("aral.png")),
    ("carrefour", Some("carrefour.png")),
    ("amic", Some("amic.png")),
    ("tesco", Some("tesco.png")),
    ("oktan", None),
    ("wadex", None),
    ("intermarche", None),
    ("olkop", None),
    ("inna", None),
];

/// Lower-cases, trims and joins whitespace runs with `_`.
///
/// Returns `None` for absent or blank labels.
pub fn normalize_brand(label: Option<&str>) -> Option<String> {
    let label = label?.trim();
    if label.is_empty() {
        return None;
    }
    Some(
        label
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_"),
    )
}

/// Brand → logo filename table plus the fallback logo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandTable {
    logos: HashMap<String, Option<String>>,
    fallback: String,
}

impl BrandTable {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            logos: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    pub fn builtin() -> Self {
        BUILTIN_LOGOS
            .iter()
            .fold(Self::new(FALLBACK_LOGO), |table, (brand, logo)| {
                table.with_brand(brand, logo.map(str::to_string))
            })
    }

    /// Adds a brand; the key is normalized the same way lookups are.
    pub fn with_brand(mut self, brand: &str, logo: Option<String>) -> Self {
        if let Some(key) = normalize_brand(Some(brand)) {
            self.logos.insert(key, logo);
        }
        self
    }

    /// Parses a JSON object of `{"brand": "file.png" | null}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: HashMap<String, Option<String>> =
            serde_json::from_str(json).context("brand table must be a JSON object")?;
        Ok(entries
            .into_iter()
            .fold(Self::new(FALLBACK_LOGO), |table, (brand, logo)| {
                table.with_brand(&brand, logo)
            }))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read brand table {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Logo file for a normalized brand, if the brand has one.
    pub fn logo_for(&self, normalized: &str) -> Option<&str> {
        self.logos.get(normalized)?.as_deref()
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn len(&self) -> usize {
        self.logos.len()
    }
}

/// A marker icon: the logo asset plus how it is drawn in the terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct BrandIcon {
    pub url: String,
    pub is_fallback: bool,
    pub glyph: char,
    pub color: Color,
}

impl BrandIcon {
    fn new(logo: &str, brand: Option<&str>, is_fallback: bool, monochrome: bool) -> Self {
        let glyph = match brand {
            Some(b) if !is_fallback => b
                .chars()
                .find(|c| c.is_alphanumeric())
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or('#'),
            _ => '*',
        };
        let color = if is_fallback || monochrome {
            Color::White
        } else {
            let hash = logo
                .bytes()
                .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            PALETTE[hash % PALETTE.len()]
        };

        Self {
            url: format!("{}/{}", LOGO_DIR, logo),
            is_fallback,
            glyph,
            color,
        }
    }
}

pub type IconRef = Rc<BrandIcon>;

/// Memoizing brand → icon resolver.
///
/// Only brands with a logo get their own entry; every other label shares the
/// single fallback entry, so the table never grows past the brand table plus one.
#[derive(Debug)]
pub struct BrandIconResolver {
    table: BrandTable,
    cache: HashMap<Option<String>, IconRef>,
    capacity: usize,
    monochrome: bool,
}

impl BrandIconResolver {
    pub fn new(table: BrandTable) -> Self {
        let capacity = table.len() + 1;
        Self {
            table,
            cache: HashMap::with_capacity(capacity),
            capacity,
            monochrome: false,
        }
    }

    pub fn resolve(&mut self, brand: Option<&str>) -> IconRef {
        let key = normalize_brand(brand);
        let Some(logo) = key.as_deref().and_then(|k| self.table.logo_for(k)) else {
            return self.fallback_icon();
        };
        if let Some(icon) = self.cache.get(&key) {
            return Rc::clone(icon);
        }

        let icon = Rc::new(BrandIcon::new(logo, key.as_deref(), false, self.monochrome));
        self.insert(key, Rc::clone(&icon));
        icon
    }

    /// Drops every memoized icon; the next lookups build fresh ones.
    pub fn invalidate(&mut self) {
        debug!("Invalidating {} cached brand icons", self.cache.len());
        self.cache.clear();
    }

    pub fn is_monochrome(&self) -> bool {
        self.monochrome
    }

    /// Switches between brand colours and plain white markers.
    pub fn set_monochrome(&mut self, monochrome: bool) {
        if self.monochrome != monochrome {
            self.monochrome = monochrome;
            self.invalidate();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn fallback_icon(&mut self) -> IconRef {
        if let Some(icon) = self.cache.get(&None) {
            return Rc::clone(icon);
        }
        let icon = Rc::new(BrandIcon::new(self.table.fallback(), None, true, self.monochrome));
        self.insert(None, Rc::clone(&icon));
        icon
    }

    fn insert(&mut self, key: Option<String>, icon: IconRef) {
        debug_assert!(self.cache.len() < self.capacity || self.cache.contains_key(&key));
        self.cache.insert(key, icon);
    }
}
