use crate::color::{CategoryColorMap, Color};
use crate::types::Datasets;
use geo::Coord;
use serde::Serialize;

/// The overlay drawing surface laid over the map pane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Surface {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    /// Offset applied to the inner group so geometry lines up with the surface origin.
    pub translate_x: f64,
    pub translate_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborhoodPath {
    pub name: String,
    /// Index into `Datasets::neighborhoods`.
    pub feature: usize,
    /// SVG path data; `None` until the first sync.
    pub d: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrimeMarker {
    /// Index into `Datasets::crimes`.
    pub record: usize,
    pub category: String,
    pub color: Color,
    /// Layer-pixel position; `None` until the first sync.
    pub translate: Option<(f64, f64)>,
    pub opacity: f32,
    pub interactive: bool,
}

impl CrimeMarker {
    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0
    }

    pub(crate) fn place(&mut self, at: Coord<f64>) {
        self.translate = Some((at.x, at.y));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendRow {
    pub category: String,
    pub color: Color,
    pub selected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Legend {
    pub rows: Vec<LegendRow>,
}

/// Which of the two layers the zoom level currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayerDisplay {
    pub neighborhoods: bool,
    pub markers: bool,
}

impl Default for LayerDisplay {
    fn default() -> Self {
        Self { neighborhoods: true, markers: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub surface: Surface,
    pub paths: Vec<NeighborhoodPath>,
    pub markers: Vec<CrimeMarker>,
    pub legend: Option<Legend>,
    pub layers: LayerDisplay,
}

/// Builds every element for the loaded data. Markers start hidden.
pub fn render_all(datasets: &Datasets, colors: &CategoryColorMap, legend: bool) -> Scene {
    let paths = datasets
        .neighborhoods
        .iter()
        .enumerate()
        .map(|(feature, n)| NeighborhoodPath {
            name: n.name.clone(),
            feature,
            d: None,
        })
        .collect();

    let markers = datasets
        .crimes
        .iter()
        .enumerate()
        .map(|(record, crime)| CrimeMarker {
            record,
            category: crime.category.clone(),
            color: colors.color_for(&crime.category),
            translate: None,
            opacity: 0.0,
            interactive: false,
        })
        .collect();

    let legend = legend.then(|| Legend {
        rows: colors
            .categories()
            .map(|(category, color)| LegendRow {
                category: category.to_string(),
                color,
                selected: false,
            })
            .collect(),
    });

    Scene {
        surface: Surface::default(),
        paths,
        markers,
        legend,
        layers: LayerDisplay::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::FALLBACK_COLOR;
    use crate::types::{CrimeRecord, Neighborhood};
    use geo::{MultiPolygon, polygon};
    use pretty_assertions::assert_eq;

    fn crime(category: &str) -> CrimeRecord {
        CrimeRecord {
            category: category.to_string(),
            longitude: -84.39,
            latitude: 33.755,
            date: None,
            fields: Default::default(),
        }
    }

    fn datasets() -> Datasets {
        Datasets {
            neighborhoods: vec![Neighborhood {
                name: "A".to_string(),
                properties: Default::default(),
                geometry: MultiPolygon::new(vec![polygon![
                    (x: -84.40, y: 33.75),
                    (x: -84.38, y: 33.75),
                    (x: -84.39, y: 33.76),
                ]]),
            }],
            crimes: vec![crime("HOMICIDE"), crime("SHOPLIFTING")],
        }
    }

    #[test]
    fn one_element_per_feature_and_record() {
        let colors = CategoryColorMap::default();
        let scene = render_all(&datasets(), &colors, true);

        assert_eq!(scene.paths.len(), 1);
        assert_eq!(scene.paths[0].name, "A");
        assert_eq!(scene.paths[0].d, None);
        assert_eq!(scene.markers.len(), 2);
        assert!(scene.markers.iter().all(|m| !m.is_visible() && !m.interactive));
        assert_eq!(scene.markers[0].color, colors.color_for("HOMICIDE"));
        assert_eq!(scene.markers[1].color, FALLBACK_COLOR);
        assert_eq!(scene.legend.as_ref().map(|l| l.rows.len()), Some(11));
    }

    #[test]
    fn legend_is_optional() {
        let scene = render_all(&datasets(), &CategoryColorMap::default(), false);
        assert!(scene.legend.is_none());
    }
}
