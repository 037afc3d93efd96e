use anyhow::{Result, anyhow};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Deserializer, de};
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct Topology {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub transform: Option<Transform>,
    // Shared arcs, quantized deltas when `transform` is present.
    pub arcs: Vec<Vec<Vec<f64>>>,
    #[serde(deserialize_with = "object_map")]
    pub objects: HashMap<String, TopoGeometry>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum TopoGeometry {
    GeometryCollection {
        #[serde(deserialize_with = "geometry_list")]
        geometries: Vec<TopoGeometry>,
    },
    Polygon {
        arcs: Vec<Vec<i64>>,
        #[serde(default)]
        id: Option<serde_json::Value>,
        #[serde(default)]
        properties: Option<serde_json::Map<String, serde_json::Value>>,
    },
    MultiPolygon {
        arcs: Vec<Vec<Vec<i64>>>,
        #[serde(default)]
        id: Option<serde_json::Value>,
        #[serde(default)]
        properties: Option<serde_json::Map<String, serde_json::Value>>,
    },
    // Points and lines carry no area; they are skipped.
    #[serde(other)]
    Other,
}

// A null `type` is a feature without a shape, read as `Other`.
fn geometry_from_value(value: serde_json::Value) -> serde_json::Result<TopoGeometry> {
    if matches!(value.get("type"), None | Some(serde_json::Value::Null)) {
        return Ok(TopoGeometry::Other);
    }
    serde_json::from_value(value)
}

fn geometry_list<'de, D>(deserializer: D) -> Result<Vec<TopoGeometry>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<serde_json::Value>::deserialize(deserializer)?
        .into_iter()
        .map(|value| geometry_from_value(value).map_err(de::Error::custom))
        .collect()
}

fn object_map<'de, D>(deserializer: D) -> Result<HashMap<String, TopoGeometry>, D::Error>
where
    D: Deserializer<'de>,
{
    HashMap::<String, serde_json::Value>::deserialize(deserializer)?
        .into_iter()
        .map(|(name, value)| {
            geometry_from_value(value)
                .map(|geometry| (name, geometry))
                .map_err(de::Error::custom)
        })
        .collect()
}

/// A polygon feature pulled out of a topology.
#[derive(Debug, Clone)]
pub struct TopoFeature {
    pub id: Option<serde_json::Value>,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub geometry: MultiPolygon<f64>,
}

impl Topology {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let topology: Topology = serde_json::from_slice(bytes)?;
        if topology.kind != "Topology" {
            return Err(anyhow!("Expected a Topology, found {:?}", topology.kind));
        }
        Ok(topology)
    }

    /// Absolute positions of every arc, with the transform applied.
    fn decoded_arcs(&self) -> Vec<Vec<Coord<f64>>> {
        self.arcs
            .iter()
            .map(|arc| {
                let mut x = 0.0;
                let mut y = 0.0;
                arc.iter()
                    .filter(|position| position.len() >= 2)
                    .map(|position| match self.transform {
                        Some(t) => {
                            x += position[0];
                            y += position[1];
                            Coord {
                                x: x * t.scale[0] + t.translate[0],
                                y: y * t.scale[1] + t.translate[1],
                            }
                        }
                        None => Coord { x: position[0], y: position[1] },
                    })
                    .collect()
            })
            .collect()
    }

    /// Flattens the named object into its polygon features, in order.
    pub fn features(&self, object: &str) -> Result<Vec<TopoFeature>> {
        let root = self
            .objects
            .get(object)
            .ok_or_else(|| anyhow!("Topology has no object named {:?}", object))?;
        let arcs = self.decoded_arcs();
        let mut out = Vec::new();
        collect_features(root, &arcs, &mut out)?;
        Ok(out)
    }
}

fn collect_features(
    geometry: &TopoGeometry,
    arcs: &[Vec<Coord<f64>>],
    out: &mut Vec<TopoFeature>,
) -> Result<()> {
    match geometry {
        TopoGeometry::GeometryCollection { geometries } => {
            for child in geometries {
                collect_features(child, arcs, out)?;
            }
        }
        TopoGeometry::Polygon { arcs: rings, id, properties } => {
            out.push(TopoFeature {
                id: id.clone(),
                properties: properties.clone().unwrap_or_default(),
                geometry: MultiPolygon::new(vec![polygon(rings, arcs)?]),
            });
        }
        TopoGeometry::MultiPolygon { arcs: polygons, id, properties } => {
            let polygons = polygons
                .iter()
                .map(|rings| polygon(rings, arcs))
                .collect::<Result<Vec<_>>>()?;
            out.push(TopoFeature {
                id: id.clone(),
                properties: properties.clone().unwrap_or_default(),
                geometry: MultiPolygon::new(polygons),
            });
        }
        TopoGeometry::Other => {}
    }
    Ok(())
}

fn polygon(rings: &[Vec<i64>], arcs: &[Vec<Coord<f64>>]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|refs| ring(refs, arcs));
    let exterior = rings
        .next()
        .ok_or_else(|| anyhow!("Polygon without rings"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring(refs: &[i64], arcs: &[Vec<Coord<f64>>]) -> Result<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::new();
    for &reference in refs {
        // A negative reference `!i` walks arc `i` backwards.
        let (index, reversed) = if reference < 0 {
            ((!reference) as usize, true)
        } else {
            (reference as usize, false)
        };
        let arc = arcs
            .get(index)
            .ok_or_else(|| anyhow!("Arc index {} out of range ({} arcs)", index, arcs.len()))?;

        let points: Vec<Coord<f64>> = if reversed {
            arc.iter().rev().copied().collect()
        } else {
            arc.clone()
        };
        // Consecutive arcs share their joining point.
        let skip = usize::from(!coords.is_empty());
        coords.extend(points.into_iter().skip(skip));
    }
    Ok(LineString::new(coords))
}
