use crate::config::InputConfig;
use crate::topology::Topology;
use crate::types::{CrimeRecord, Neighborhood};
use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use geo::MultiPolygon;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {dataset} from {path:?}")]
    Read {
        dataset: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {dataset} from {path:?}: {reason:#}")]
    Parse {
        dataset: &'static str,
        path: PathBuf,
        reason: anyhow::Error,
    },
}

const NEIGHBORHOODS: &str = "neighborhoods";
const CRIMES: &str = "crimes";

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

async fn read(dataset: &'static str, path: &Path) -> Result<Vec<u8>, LoadError> {
    tokio::fs::read(path).await.map_err(|source| LoadError::Read {
        dataset,
        path: path.to_path_buf(),
        source,
    })
}

pub async fn load_neighborhoods(input: &InputConfig) -> Result<Vec<Neighborhood>, LoadError> {
    let path = &input.neighborhoods;
    info!(path = ?path, "Loading neighborhoods");
    let bytes = read(NEIGHBORHOODS, path).await?;

    let neighborhoods = parse_neighborhoods(&bytes, input).map_err(|reason| LoadError::Parse {
        dataset: NEIGHBORHOODS,
        path: path.clone(),
        reason,
    })?;
    info!(count = neighborhoods.len(), "Loaded neighborhoods");
    Ok(neighborhoods)
}

pub async fn load_crimes(input: &InputConfig) -> Result<Vec<CrimeRecord>, LoadError> {
    let path = &input.crimes;
    info!(path = ?path, "Loading crimes");
    let bytes = read(CRIMES, path).await?;

    let crimes = parse_crimes(&bytes, input).map_err(|reason| LoadError::Parse {
        dataset: CRIMES,
        path: path.clone(),
        reason,
    })?;
    info!(count = crimes.len(), "Loaded crimes");
    Ok(crimes)
}

/// Accepts either a TopoJSON topology or a GeoJSON FeatureCollection.
pub fn parse_neighborhoods(bytes: &[u8], input: &InputConfig) -> anyhow::Result<Vec<Neighborhood>> {
    let document: serde_json::Value =
        serde_json::from_slice(bytes).context("Boundary file is not valid JSON")?;

    match document.get("type").and_then(serde_json::Value::as_str) {
        Some("Topology") => load_topology(bytes, input),
        Some("FeatureCollection") => load_geojson(document, input),
        other => Err(anyhow!("Unsupported boundary document type: {:?}", other)),
    }
}

fn load_topology(bytes: &[u8], input: &InputConfig) -> anyhow::Result<Vec<Neighborhood>> {
    let topology = Topology::from_slice(bytes).context("Failed to parse TopoJSON")?;
    let features = topology.features(&input.topology_object)?;

    Ok(features
        .into_iter()
        .enumerate()
        .map(|(i, feature)| Neighborhood {
            name: feature_name(&feature.properties, feature.id.as_ref(), &input.name_property, i),
            properties: feature.properties,
            geometry: feature.geometry,
        })
        .collect())
}

fn load_geojson(document: serde_json::Value, input: &InputConfig) -> anyhow::Result<Vec<Neighborhood>> {
    use geojson::{FeatureCollection, GeoJson};
    use std::convert::TryInto;

    let collection = match GeoJson::from_json_value(document).context("Failed to parse GeoJSON")? {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };
    let FeatureCollection { features, .. } = collection;

    let mut neighborhoods = Vec::new();
    for (i, feature) in features.into_iter().enumerate() {
        let geometry = match feature.geometry {
            Some(geo) => {
                let valid_geo: geo::Geometry<f64> = geo.value.try_into()
                    .map_err(|e| anyhow!("Failed to convert geojson geometry: {:?}", e))?;
                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        let id = feature.id.map(|id| match id {
            geojson::feature::Id::String(s) => serde_json::Value::String(s),
            geojson::feature::Id::Number(n) => serde_json::Value::Number(n),
        });
        let properties = feature.properties.unwrap_or_default();

        neighborhoods.push(Neighborhood {
            name: feature_name(&properties, id.as_ref(), &input.name_property, i),
            properties,
            geometry,
        });
    }
    Ok(neighborhoods)
}

fn feature_name(
    properties: &serde_json::Map<String, serde_json::Value>,
    id: Option<&serde_json::Value>,
    name_property: &str,
    index: usize,
) -> String {
    let label = |value: &serde_json::Value| match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    properties
        .get(name_property)
        .and_then(label)
        .or_else(|| id.and_then(label))
        .unwrap_or_else(|| format!("neighborhood-{}", index))
}

pub fn parse_crimes(bytes: &[u8], input: &InputConfig) -> anyhow::Result<Vec<CrimeRecord>> {
    let columns = &input.columns;
    let mut rdr = ReaderBuilder::new().from_reader(bytes);
    let headers = rdr.headers()?.clone();

    let position = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &str| {
        position(name).ok_or_else(|| anyhow!("Column '{}' not found in CSV", name))
    };
    let category_idx = required(&columns.category)?;
    let lon_idx = required(&columns.longitude)?;
    let lat_idx = required(&columns.latitude)?;
    let date_idx = columns.date.as_deref().and_then(position);
    if date_idx.is_none() {
        debug!(column = ?columns.date, "No date column, calendar will be empty");
    }

    let mut crimes = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        // Header is line 1.
        let line = row + 2;
        let coordinate = |idx: usize, name: &str| -> anyhow::Result<f64> {
            let raw = record.get(idx).unwrap_or("").trim();
            raw.parse::<f64>()
                .with_context(|| format!("Line {}: {} {:?} is not a number", line, name, raw))
        };

        let longitude = coordinate(lon_idx, &columns.longitude)?;
        let latitude = coordinate(lat_idx, &columns.latitude)?;
        let category = record.get(category_idx).unwrap_or("").to_string();
        let date = date_idx
            .and_then(|idx| record.get(idx))
            .and_then(parse_date);

        let fields = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(idx, _)| ![category_idx, lon_idx, lat_idx].contains(idx))
            .map(|(_, (h, v))| (h.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>();

        crimes.push(CrimeRecord {
            category,
            longitude,
            latitude,
            date,
            fields,
        });
    }

    Ok(crimes)
}

/// Leading date portion only; timestamps like `2015-01-03 14:00` keep the day.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.split_whitespace().next()?;
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(day, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrimeColumns;
    use std::io::Write;

    fn input(neighborhoods: PathBuf, crimes: PathBuf) -> InputConfig {
        InputConfig {
            neighborhoods,
            crimes,
            topology_object: "neighborhoods".to_string(),
            name_property: "name".to_string(),
            columns: CrimeColumns::default(),
        }
    }

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const CSV: &str = "offense_id,category,long,lat,date\n\
                       1,HOMICIDE,-84.39,33.755,2015-01-03\n\
                       2,AUTO THEFT,-84.41,33.76,01/04/2015\n\
                       3,ROBBERY-PEDESTRIAN,-84.38,33.74,\n";

    #[test]
    fn parses_crime_rows() {
        let input = input(PathBuf::new(), PathBuf::new());
        let crimes = parse_crimes(CSV.as_bytes(), &input).unwrap();

        assert_eq!(crimes.len(), 3);
        assert_eq!(crimes[0].category, "HOMICIDE");
        assert_eq!(crimes[0].longitude, -84.39);
        assert_eq!(crimes[0].latitude, 33.755);
        assert_eq!(crimes[0].date, NaiveDate::from_ymd_opt(2015, 1, 3));
        assert_eq!(crimes[1].date, NaiveDate::from_ymd_opt(2015, 1, 4));
        assert_eq!(crimes[2].date, None);
        assert_eq!(crimes[0].fields.get("offense_id").map(String::as_str), Some("1"));
        assert!(!crimes[0].fields.contains_key("lat"));
        assert!(crimes[0].fields.contains_key("date"));
    }

    #[test]
    fn missing_coordinate_column_is_an_error() {
        let input = input(PathBuf::new(), PathBuf::new());
        let err = parse_crimes(b"category,long\nHOMICIDE,-84.39\n", &input).unwrap_err();
        assert!(err.to_string().contains("'lat'"));
    }

    #[test]
    fn bad_coordinate_is_an_error() {
        let input = input(PathBuf::new(), PathBuf::new());
        let err = parse_crimes(b"category,long,lat\nHOMICIDE,-84.39,north\n", &input).unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }

    #[test]
    fn date_formats() {
        assert_eq!(parse_date("2015-02-28"), NaiveDate::from_ymd_opt(2015, 2, 28));
        assert_eq!(parse_date("02/28/2015 13:45"), NaiveDate::from_ymd_opt(2015, 2, 28));
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn geojson_boundaries_use_name_then_id() {
        let input = input(PathBuf::new(), PathBuf::new());
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "name": "Midtown" },
                  "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]] } },
                { "type": "Feature", "id": "npu-e", "properties": {},
                  "geometry": { "type": "Polygon", "coordinates": [[[2,2],[3,2],[3,3],[2,2]]] } },
                { "type": "Feature", "properties": { "name": "Marker" },
                  "geometry": { "type": "Point", "coordinates": [0,0] } }
            ]
        }"#;
        let neighborhoods = parse_neighborhoods(raw.as_bytes(), &input).unwrap();
        assert_eq!(neighborhoods.len(), 2);
        assert_eq!(neighborhoods[0].name, "Midtown");
        assert_eq!(neighborhoods[1].name, "npu-e");
    }

    #[tokio::test]
    async fn loads_topology_from_disk() {
        let topo = write_temp(
            r#"{
                "type": "Topology",
                "objects": { "neighborhoods": { "type": "GeometryCollection", "geometries": [
                    { "type": "Polygon", "arcs": [[0]], "properties": { "name": "Downtown" } },
                    { "type": "Polygon", "arcs": [[1]] }
                ] } },
                "arcs": [
                    [[-84.40, 33.75], [-84.38, 33.75], [-84.38, 33.77], [-84.40, 33.75]],
                    [[-84.30, 33.75], [-84.28, 33.75], [-84.28, 33.77], [-84.30, 33.75]]
                ]
            }"#,
        );
        let input = input(topo.path().to_path_buf(), PathBuf::new());

        let neighborhoods = load_neighborhoods(&input).await.unwrap();
        assert_eq!(neighborhoods.len(), 2);
        assert_eq!(neighborhoods[0].name, "Downtown");
        assert_eq!(neighborhoods[1].name, "neighborhood-1");
    }

    #[tokio::test]
    async fn load_errors_name_the_dataset() {
        let input = input(PathBuf::from("/nonexistent/n.json"), PathBuf::from("/nonexistent/c.csv"));

        let err = load_crimes(&input).await.unwrap_err();
        assert!(matches!(err, LoadError::Read { dataset: "crimes", .. }));

        let bad = write_temp("{ \"type\": \"Topology\", ");
        let input = InputConfig { neighborhoods: bad.path().to_path_buf(), ..input };
        let err = load_neighborhoods(&input).await.unwrap_err();
        assert!(matches!(err, LoadError::Parse { dataset: "neighborhoods", .. }));
    }
}
