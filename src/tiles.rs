use crate::config::TileConfig;
use crate::projection::{TILE_SIZE, Viewport};
use geo::Coord;

#[derive(Debug, Clone, PartialEq)]
pub struct TileRef {
    pub z: u8,
    pub x: u32,
    pub y: u32,
    pub url: String,
    /// Top-left corner in layer pixels.
    pub left: f64,
    pub top: f64,
}

/// Tiles overlapping the view, row by row, with their layer offsets.
pub fn visible_tiles(view: &Viewport, config: &TileConfig) -> Vec<TileRef> {
    let z = view.zoom;
    if z < config.min_zoom || z > config.max_zoom {
        return Vec::new();
    }

    let origin = view.pixel_origin();
    let fx = origin.x / TILE_SIZE;
    let fy = origin.y / TILE_SIZE;
    if !fx.is_finite() || !fy.is_finite() {
        return Vec::new();
    }

    let count = 1_i64 << z;
    // Columns are counted from the first tile's offset, so far-off longitudes
    // never reach the integer casts.
    let first_x = fx.floor();
    let shift_x = (fx - first_x) * TILE_SIZE;
    let columns = ((shift_x + f64::from(view.width)) / TILE_SIZE).ceil() as i64;
    let base_x = first_x.rem_euclid(count as f64) as i64;

    let first_y = fy.floor() as i64;
    let last_y = (((origin.y + f64::from(view.height)) / TILE_SIZE).ceil() as i64).saturating_sub(1);

    let mut tiles = Vec::new();
    for ty in first_y.max(0)..=last_y.min(count - 1) {
        for column in 0..columns {
            // Wrap around the antimeridian.
            let x = (base_x + column).rem_euclid(count) as u32;
            let y = ty as u32;
            let corner = Coord {
                x: column as f64 * TILE_SIZE - shift_x,
                y: ty as f64 * TILE_SIZE - origin.y,
            };
            tiles.push(TileRef {
                z,
                x,
                y,
                url: tile_url(config, z, x, y),
                left: corner.x,
                top: corner.y,
            });
        }
    }
    tiles
}

pub fn tile_url(config: &TileConfig, z: u8, x: u32, y: u32) -> String {
    let subdomain = if config.subdomains.is_empty() {
        ""
    } else {
        let i = (x as usize + y as usize) % config.subdomains.len();
        config.subdomains[i].as_str()
    };
    config
        .url
        .replace("{s}", subdomain)
        .replace("{z}", &z.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
}
