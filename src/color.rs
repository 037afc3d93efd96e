use crate::config::CategoryConfig;
use anyhow::{Result, anyhow};
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color([u8; 3]);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color([r, g, b])
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Color([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Drawn for categories outside the known list.
pub const FALLBACK_COLOR: Color = Color::rgb(0x99, 0x99, 0x99);

/// Atlanta PD offense categories, in legend order.
pub const DEFAULT_CATEGORIES: [(&str, Color); 11] = [
    ("AGG ASSAULT", Color::rgb(0xe4, 0x1a, 0x1c)),
    ("AUTO THEFT", Color::rgb(0x37, 0x7e, 0xb8)),
    ("BURGLARY-NONRES", Color::rgb(0x4d, 0xaf, 0x4a)),
    ("BURGLARY-RESIDENCE", Color::rgb(0x98, 0x4e, 0xa3)),
    ("HOMICIDE", Color::rgb(0xff, 0x7f, 0x00)),
    ("LARCENY-FROM VEHICLE", Color::rgb(0xff, 0xff, 0x33)),
    ("LARCENY-NON VEHICLE", Color::rgb(0xa6, 0x56, 0x28)),
    ("RAPE", Color::rgb(0xf7, 0x81, 0xbf)),
    ("ROBBERY-COMMERCIAL", Color::rgb(0x66, 0xc2, 0xa5)),
    ("ROBBERY-PEDESTRIAN", Color::rgb(0xfc, 0x8d, 0x62)),
    ("ROBBERY-RESIDENCE", Color::rgb(0x8d, 0xa0, 0xcb)),
];

/// Category → display color. Built once at startup and only read afterwards.
#[derive(Debug, Clone)]
pub struct CategoryColorMap {
    entries: Vec<(String, Color)>,
}

impl Default for CategoryColorMap {
    fn default() -> Self {
        Self {
            entries: DEFAULT_CATEGORIES
                .iter()
                .map(|(name, color)| (name.to_string(), *color))
                .collect(),
        }
    }
}

impl CategoryColorMap {
    /// The built-in list unless the config names its own categories.
    pub fn from_config(categories: &[CategoryConfig]) -> Result<Self> {
        if categories.is_empty() {
            return Ok(Self::default());
        }
        let entries = categories
            .iter()
            .map(|c| {
                Color::from_hex(&c.color)
                    .map(|color| (c.name.clone(), color))
                    .ok_or_else(|| anyhow!("Invalid color {:?} for category {:?}", c.color, c.name))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn get(&self, category: &str) -> Option<Color> {
        self.entries
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, color)| *color)
    }

    pub fn color_for(&self, category: &str) -> Color {
        self.get(category).unwrap_or(FALLBACK_COLOR)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, Color)> + '_ {
        self.entries.iter().map(|(name, color)| (name.as_str(), *color))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip_and_rejects_garbage() {
        assert_eq!(Color::from_hex("#ff7f00"), Some(Color::rgb(255, 127, 0)));
        assert_eq!(Color::from_hex("4DAF4A").map(|c| c.to_string()), Some("#4daf4a".to_string()));
        assert_eq!(Color::from_hex("#fff"), None);
        assert_eq!(Color::from_hex("#gg0000"), None);
    }

    #[test]
    fn unknown_category_falls_back() {
        let colors = CategoryColorMap::default();
        assert_eq!(colors.len(), 11);
        assert_eq!(colors.color_for("HOMICIDE"), Color::rgb(0xff, 0x7f, 0x00));
        assert_eq!(colors.color_for("JAYWALKING"), FALLBACK_COLOR);
    }

    #[test]
    fn config_overrides_defaults() {
        let colors = CategoryColorMap::from_config(&[CategoryConfig {
            name: "HOMICIDE".to_string(),
            color: "#000000".to_string(),
        }])
        .unwrap();
        assert_eq!(colors.len(), 1);
        assert_eq!(colors.color_for("HOMICIDE"), Color::rgb(0, 0, 0));
        assert_eq!(colors.color_for("AUTO THEFT"), FALLBACK_COLOR);

        let bad = CategoryColorMap::from_config(&[CategoryConfig {
            name: "RAPE".to_string(),
            color: "pink".to_string(),
        }]);
        assert!(bad.is_err());
    }
}
