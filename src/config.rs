use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub tiles: TileConfig,
    /// Overrides the built-in Atlanta PD category list when present.
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub neighborhoods: PathBuf,
    pub crimes: PathBuf,
    /// Name of the object collection inside the topology file.
    #[serde(default = "default_topology_object")]
    pub topology_object: String,
    /// Feature property holding the neighborhood name.
    #[serde(default = "default_name_property")]
    pub name_property: String,
    #[serde(default)]
    pub columns: CrimeColumns,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CrimeColumns {
    pub category: String,
    pub longitude: String,
    pub latitude: String,
    pub date: Option<String>,
}

impl Default for CrimeColumns {
    fn default() -> Self {
        Self {
            category: "category".to_string(),
            longitude: "long".to_string(),
            latitude: "lat".to_string(),
            date: Some("date".to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Markers replace neighborhood outlines at this zoom and above.
    pub detail_zoom: u8,
    pub width: u32,
    pub height: u32,
    pub legend: bool,
    pub calendar: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: 33.755,
            center_lon: -84.390,
            zoom: 11,
            min_zoom: 11,
            max_zoom: 18,
            detail_zoom: 15,
            width: 1024,
            height: 768,
            legend: true,
            calendar: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TileConfig {
    pub url: String,
    pub subdomains: Vec<String>,
    pub attribution: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            url: "http://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}.png".to_string(),
            subdomains: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            attribution: "&copy; <a href=\"http://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors, &copy; <a href=\"http://cartodb.com/attributions\">CartoDB</a>".to_string(),
            min_zoom: 11,
            max_zoom: 18,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    pub name: String,
    pub color: String, // Hex code
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Served as static files under any path the router doesn't claim.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: PathBuf::from("data"),
        }
    }
}

fn default_topology_object() -> String {
    "neighborhoods".to_string()
}

fn default_name_property() -> String {
    "name".to_string()
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [input]
            neighborhoods = "data/neighborhoods.json"
            crimes = "data/atl-crime-data-2015.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.input.topology_object, "neighborhoods");
        assert_eq!(config.input.columns.latitude, "lat");
        assert_eq!(config.map.zoom, 11);
        assert_eq!(config.map.detail_zoom, 15);
        assert_eq!(config.tiles.max_zoom, 18);
        assert_eq!(config.tiles.subdomains.len(), 3);
        assert_eq!(config.server.port, 3000);
        assert!(config.categories.is_empty());
    }

    #[test]
    fn overrides_columns_and_categories() {
        let config = AppConfig::from_toml(
            r##"
            [input]
            neighborhoods = "n.json"
            crimes = "c.csv"

            [input.columns]
            category = "UC2 Literal"
            longitude = "x"
            latitude = "y"

            [map]
            detail_zoom = 14

            [[categories]]
            name = "HOMICIDE"
            color = "#ff0000"
            "##,
        )
        .unwrap();

        assert_eq!(config.input.columns.category, "UC2 Literal");
        assert_eq!(config.input.columns.date.as_deref(), Some("date"));
        assert_eq!(config.map.detail_zoom, 14);
        assert_eq!(config.map.center_lat, 33.755);
        assert_eq!(config.categories[0].name, "HOMICIDE");
    }

    #[test]
    fn missing_input_is_an_error() {
        assert!(AppConfig::from_toml("[map]\nzoom = 12\n").is_err());
    }
}
