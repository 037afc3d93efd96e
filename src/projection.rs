use crate::types::Neighborhood;
use geo::{Coord, Rect};
use serde::Serialize;
use std::f64::consts::PI;

pub const TILE_SIZE: f64 = 256.0;
pub const MAX_LATITUDE: f64 = 85.051_128_779_8;

/// Maps geographic coordinates to layer pixels for the current view.
pub trait Projection {
    fn project(&self, lon: f64, lat: f64) -> Coord<f64>;
}

/// Free-standing form so callers pass the projection explicitly.
pub fn project<P: Projection + ?Sized>(projection: &P, lon: f64, lat: f64) -> Coord<f64> {
    projection.project(lon, lat)
}

/// Brings any finite longitude into `[-180, 180)`.
pub fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Pixel position on the whole-world Web Mercator bitmap at `zoom`.
pub fn world_pixel(lon: f64, lat: f64, zoom: u8) -> Coord<f64> {
    let n = 2.0_f64.powi(zoom as i32) * TILE_SIZE;
    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    Coord {
        x: (lon + 180.0) / 360.0 * n,
        y: (1.0 - (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() / PI) / 2.0 * n,
    }
}

/// Inverse of [`world_pixel`], as (lon, lat).
pub fn unproject_world_pixel(pixel: Coord<f64>, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32) * TILE_SIZE;
    let lon = pixel.x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * pixel.y / n)).sinh().atan().to_degrees();
    (lon, lat)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(center_lat: f64, center_lon: f64, zoom: u8, width: u32, height: u32) -> Self {
        Self { center_lat, center_lon, zoom, width, height }
    }

    /// World pixel of the view's top-left corner; layer points are relative to it.
    pub fn pixel_origin(&self) -> Coord<f64> {
        let center = world_pixel(self.center_lon, self.center_lat, self.zoom);
        Coord {
            x: center.x - f64::from(self.width) / 2.0,
            y: center.y - f64::from(self.height) / 2.0,
        }
    }

    /// Inverse of [`Projection::project`], as (lon, lat).
    pub fn unproject(&self, point: Coord<f64>) -> (f64, f64) {
        let origin = self.pixel_origin();
        unproject_world_pixel(
            Coord { x: point.x + origin.x, y: point.y + origin.y },
            self.zoom,
        )
    }
}

impl Projection for Viewport {
    fn project(&self, lon: f64, lat: f64) -> Coord<f64> {
        let origin = self.pixel_origin();
        let pixel = world_pixel(lon, lat, self.zoom);
        Coord { x: pixel.x - origin.x, y: pixel.y - origin.y }
    }
}

/// Projected bounding box of every vertex of every neighborhood.
pub fn projected_bounds<P: Projection + ?Sized>(
    neighborhoods: &[Neighborhood],
    projection: &P,
) -> Option<Rect<f64>> {
    let mut points = neighborhoods.iter().flat_map(|n| {
        n.geometry.iter().flat_map(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .flat_map(|ring| ring.coords())
        })
    });

    let first = points.next()?;
    let first = projection.project(first.x, first.y);
    let (min, max) = points.fold((first, first), |(min, max), c| {
        let p = projection.project(c.x, c.y);
        (
            Coord { x: min.x.min(p.x), y: min.y.min(p.y) },
            Coord { x: max.x.max(p.x), y: max.y.max(p.y) },
        )
    });
    Some(Rect::new(min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn world_pixel_matches_tile_grid() {
        // Null island sits at the center of the world bitmap.
        let p = world_pixel(0.0, 0.0, 1);
        assert!(close(p.x, 256.0) && close(p.y, 256.0));

        let corner = world_pixel(-180.0, MAX_LATITUDE, 3);
        assert!(close(corner.x, 0.0));
        assert!(corner.y.abs() < 1e-3);

        // Polar latitudes clamp instead of going infinite.
        assert!(world_pixel(0.0, 90.0, 0).y.is_finite());
    }

    #[test]
    fn center_projects_to_middle_of_view() {
        let view = Viewport::new(33.755, -84.390, 16, 800, 600);
        let p = project(&view, -84.390, 33.755);
        assert!(close(p.x, 400.0) && close(p.y, 300.0));

        let (lon, lat) = view.unproject(Coord { x: 400.0, y: 300.0 });
        assert!(close(lon, -84.390) && close(lat, 33.755));
    }

    #[test]
    fn projection_is_stable_for_same_view() {
        let view = Viewport::new(33.755, -84.390, 13, 1024, 768);
        assert_eq!(view.project(-84.41, 33.76), view.project(-84.41, 33.76));

        let zoomed = Viewport { zoom: 14, ..view };
        let a = view.project(-84.41, 33.76);
        let b = zoomed.project(-84.41, 33.76);
        // One zoom level doubles distances from the view center.
        assert!(close(b.x - 512.0, 2.0 * (a.x - 512.0)));
        assert!(close(b.y - 384.0, 2.0 * (a.y - 384.0)));
    }
}
