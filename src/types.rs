use chrono::NaiveDate;
use geo::MultiPolygon;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Neighborhood {
    pub name: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
    // x = longitude, y = latitude
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrimeRecord {
    pub category: String,
    pub longitude: f64,
    pub latitude: f64,
    pub date: Option<NaiveDate>,
    // Every other CSV column, untouched.
    pub fields: BTreeMap<String, String>,
}

/// Both datasets, loaded together and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub neighborhoods: Vec<Neighborhood>,
    pub crimes: Vec<CrimeRecord>,
}
