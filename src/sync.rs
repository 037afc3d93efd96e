use crate::filter::FilterState;
use crate::projection::{Projection, project, projected_bounds};
use crate::scene::{LayerDisplay, Scene, Surface};
use crate::types::Datasets;
use geo::{LineString, Polygon};
use std::fmt::Write;

/// Re-projects the whole scene for the current view and applies the filter.
pub fn sync_positions<P: Projection + ?Sized>(
    scene: &mut Scene,
    datasets: &Datasets,
    projection: &P,
    filter: &FilterState,
) {
    scene.surface = match projected_bounds(&datasets.neighborhoods, projection) {
        Some(bounds) => Surface {
            left: bounds.min().x,
            top: bounds.min().y,
            width: bounds.width(),
            height: bounds.height(),
            translate_x: -bounds.min().x,
            translate_y: -bounds.min().y,
        },
        None => Surface::default(),
    };

    for path in &mut scene.paths {
        if let Some(neighborhood) = datasets.neighborhoods.get(path.feature) {
            let mut d = String::new();
            for polygon in neighborhood.geometry.iter() {
                write_polygon(&mut d, polygon, projection);
            }
            path.d = Some(d);
        }
    }

    for marker in &mut scene.markers {
        if let Some(crime) = datasets.crimes.get(marker.record) {
            marker.place(project(projection, crime.longitude, crime.latitude));
        }
        let shown = filter.admits(&marker.category);
        marker.opacity = if shown { 1.0 } else { 0.0 };
        marker.interactive = shown;
    }

    if let Some(legend) = scene.legend.as_mut() {
        for row in &mut legend.rows {
            row.selected = filter.selected() == Some(row.category.as_str());
        }
    }
}

/// Level-of-detail switch: markers from `threshold` up, outlines below it.
pub fn sync_zoom_visibility(scene: &mut Scene, zoom: u8, threshold: u8) {
    let detailed = zoom >= threshold;
    scene.layers = LayerDisplay {
        neighborhoods: !detailed,
        markers: detailed,
    };
}

fn write_polygon<P: Projection + ?Sized>(out: &mut String, polygon: &Polygon<f64>, projection: &P) {
    write_ring(out, polygon.exterior(), projection);
    for interior in polygon.interiors() {
        write_ring(out, interior, projection);
    }
}

fn write_ring<P: Projection + ?Sized>(out: &mut String, ring: &LineString<f64>, projection: &P) {
    // Closed rings repeat their first point; `Z` already closes the path.
    let count = if ring.is_closed() { ring.0.len().saturating_sub(1) } else { ring.0.len() };
    if count == 0 {
        return;
    }
    for (i, c) in ring.coords().take(count).enumerate() {
        let p = projection.project(c.x, c.y);
        let command = if i == 0 { 'M' } else { 'L' };
        let _ = write!(out, "{}{},{}", command, p.x, p.y);
    }
    out.push('Z');
}
