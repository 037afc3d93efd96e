use crate::app::{LoadState, MapSession};
use crate::calendar::CalendarData;
use crate::config::TileConfig;
use crate::projection::Viewport;
use crate::scene::Scene;
use crate::tiles::visible_tiles;
use geo::Coord;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt::Write;

const MARKER_RADIUS: f64 = 3.0;

// Unreserved characters stay as they are in query values.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

const STYLE: &str = "\
body { margin: 0; background: #111; color: #ddd; font: 12px sans-serif; }
#map { position: relative; overflow: hidden; background: #222; }
#map .tiles img { position: absolute; width: 256px; height: 256px; }
#map svg.overlay { position: absolute; overflow: visible; }
#map .neighborhoods path { fill: #fff; fill-opacity: 0.08; stroke: #fff; stroke-width: 1; }
#map .attribution { position: absolute; right: 0; bottom: 0; padding: 2px 4px; background: rgba(0,0,0,.6); }
#map .controls { position: absolute; left: 8px; top: 8px; }
#map .controls a { display: block; width: 24px; text-align: center; background: #333; color: #fff; text-decoration: none; margin-bottom: 2px; }
#map .notice { position: absolute; left: 50%; top: 40%; transform: translateX(-50%); padding: 12px 18px; background: #333; }
#map .notice.error { background: #7a1f1f; }
.legend a { display: block; color: #ddd; text-decoration: none; padding: 2px 4px; }
.legend a.selected { background: #444; font-weight: bold; }
.legend .swatch { display: inline-block; width: 10px; height: 10px; margin-right: 6px; }
.calendar td { width: 10px; height: 10px; padding: 0; }
.calendar .l0 { background: #2a2a2a; } .calendar .l1 { background: #4d2a2a; }
.calendar .l2 { background: #803333; } .calendar .l3 { background: #b33c3c; }
.calendar .l4 { background: #e64545; }
";

pub fn render_page(session: &MapSession, tiles: &TileConfig) -> String {
    let view = session.viewport();
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    out.push_str("<title>Atlanta crime 2015</title>");
    let _ = write!(out, "<style>{}</style></head><body>\n", STYLE);

    let _ = write!(
        out,
        "<div id=\"map\" style=\"width:{}px;height:{}px\">\n",
        view.width, view.height
    );
    write_tiles(&mut out, view, tiles);

    match session.state() {
        LoadState::Ready { scene, .. } => write_overlay(&mut out, scene),
        LoadState::Pending => {
            out.push_str("<div class=\"notice\">Loading map data&hellip;</div>\n");
        }
        LoadState::Failed(message) => {
            let _ = write!(
                out,
                "<div class=\"notice error\">Could not load map data: {}</div>\n",
                escape(message)
            );
        }
    }
    write_controls(&mut out, session);
    let _ = write!(out, "<div class=\"attribution\">{}</div>\n</div>\n", tiles.attribution);

    if let Some(legend) = session.scene().and_then(|s| s.legend.as_ref()) {
        out.push_str("<div class=\"legend\">\n");
        for row in &legend.rows {
            let next = if row.selected { None } else { Some(row.category.as_str()) };
            let _ = write!(
                out,
                "<a class=\"legend-row{}\" href=\"{}\"><span class=\"swatch\" style=\"background:{}\"></span>{}</a>\n",
                if row.selected { " selected" } else { "" },
                escape(&view_href(view, next)),
                row.color,
                escape(&row.category)
            );
        }
        out.push_str("</div>\n");
    }

    if session.map_config().calendar {
        if let Some(datasets) = session.datasets() {
            let calendar = CalendarData::from_crimes(&datasets.crimes, session.filter());
            write_calendar(&mut out, &calendar);
        }
    }

    out.push_str("</body></html>\n");
    out
}

fn write_tiles(out: &mut String, view: &Viewport, config: &TileConfig) {
    out.push_str("<div class=\"tiles\">");
    for tile in visible_tiles(view, config) {
        let _ = write!(
            out,
            "<img src=\"{}\" style=\"left:{}px;top:{}px\" alt=\"\">",
            escape(&tile.url),
            tile.left,
            tile.top
        );
    }
    out.push_str("</div>\n");
}

/// The overlay as SVG markup, usable on its own.
pub fn render_overlay(scene: &Scene) -> String {
    let mut out = String::new();
    write_overlay(&mut out, scene);
    out
}

fn write_overlay(out: &mut String, scene: &Scene) {
    let s = &scene.surface;
    let display = |shown: bool| if shown { "block" } else { "none" };

    let _ = write!(
        out,
        "<svg class=\"overlay\" xmlns=\"http://www.w3.org/2000/svg\" style=\"left:{}px;top:{}px\" width=\"{}\" height=\"{}\">\n",
        s.left, s.top, s.width, s.height
    );
    let _ = write!(out, "<g transform=\"translate({},{})\">\n", s.translate_x, s.translate_y);

    let _ = write!(
        out,
        "<g class=\"neighborhoods\" style=\"display:{}\">\n",
        display(scene.layers.neighborhoods)
    );
    for path in &scene.paths {
        if let Some(d) = &path.d {
            let _ = write!(
                out,
                "<path d=\"{}\"><title>{}</title></path>\n",
                d,
                escape(&path.name)
            );
        }
    }
    out.push_str("</g>\n");

    let _ = write!(
        out,
        "<g class=\"crimes\" style=\"display:{}\">\n",
        display(scene.layers.markers)
    );
    for marker in &scene.markers {
        let Some((x, y)) = marker.translate else { continue };
        let _ = write!(
            out,
            "<circle r=\"{}\" transform=\"translate({},{})\" fill=\"{}\" style=\"opacity:{};pointer-events:{}\"><title>{}</title></circle>\n",
            MARKER_RADIUS,
            x,
            y,
            marker.color,
            marker.opacity,
            if marker.interactive { "all" } else { "none" },
            escape(&marker.category)
        );
    }
    out.push_str("</g>\n</g>\n</svg>\n");
}

fn write_controls(out: &mut String, session: &MapSession) {
    let view = session.viewport();
    let map = session.map_config();
    let filter = session.filter().selected();

    // Half a view in each direction.
    let pan = |dx: f64, dy: f64| {
        let (lon, lat) = view.unproject(Coord {
            x: f64::from(view.width) / 2.0 + dx,
            y: f64::from(view.height) / 2.0 + dy,
        });
        Viewport { center_lat: lat, center_lon: lon, ..*view }
    };
    let half_w = f64::from(view.width) / 2.0;
    let half_h = f64::from(view.height) / 2.0;

    let zoom_in = Viewport { zoom: view.zoom.saturating_add(1).min(map.max_zoom), ..*view };
    let zoom_out = Viewport { zoom: view.zoom.saturating_sub(1).max(map.min_zoom), ..*view };
    let controls = [
        ("+", zoom_in),
        ("&minus;", zoom_out),
        ("&uarr;", pan(0.0, -half_h)),
        ("&darr;", pan(0.0, half_h)),
        ("&larr;", pan(-half_w, 0.0)),
        ("&rarr;", pan(half_w, 0.0)),
    ];

    out.push_str("<div class=\"controls\">");
    for (label, target) in controls {
        let _ = write!(out, "<a href=\"{}\">{}</a>", escape(&view_href(&target, filter)), label);
    }
    out.push_str("</div>\n");
}

fn write_calendar(out: &mut String, calendar: &CalendarData) {
    out.push_str("<div class=\"calendar\">\n");
    let weeks = calendar.weeks();
    if weeks.is_empty() {
        out.push_str("<p>No dated incidents.</p>\n</div>\n");
        return;
    }

    // Weekdays down, weeks across.
    out.push_str("<table>\n");
    for weekday in 0..7 {
        out.push_str("<tr>");
        for week in &weeks {
            let date = week[weekday];
            let _ = write!(
                out,
                "<td class=\"l{}\" title=\"{}: {}\"></td>",
                calendar.level(date),
                date,
                calendar.count(date)
            );
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
    if let (Some(first), Some(last)) = (calendar.first_day(), calendar.last_day()) {
        let _ = write!(
            out,
            "<p>{} &ndash; {} ({} days, busiest {} incidents)</p>\n",
            first,
            last,
            (last - first).num_days() + 1,
            calendar.max
        );
    }
    out.push_str("</div>\n");
}

/// Query string that reproduces a view and filter on the page route.
pub fn view_href(view: &Viewport, category: Option<&str>) -> String {
    let mut href = format!(
        "?lat={:.6}&lon={:.6}&zoom={}&width={}&height={}",
        view.center_lat, view.center_lon, view.zoom, view.width, view.height
    );
    if let Some(category) = category {
        href.push_str("&category=");
        href.extend(utf8_percent_encode(category, QUERY_VALUE));
    }
    href
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::MapEvent;
    use crate::color::CategoryColorMap;
    use crate::config::AppConfig;
    use crate::types::{CrimeRecord, Datasets, Neighborhood};
    use chrono::NaiveDate;
    use geo::{MultiPolygon, polygon};
    use std::sync::Arc;

    fn config() -> AppConfig {
        AppConfig::from_toml(
            r#"
            [input]
            neighborhoods = "neighborhoods.json"
            crimes = "atl-crime-data-2015.csv"
            "#,
        )
        .unwrap()
    }

    fn datasets() -> Arc<Datasets> {
        Arc::new(Datasets {
            neighborhoods: vec![Neighborhood {
                name: "Old Fourth Ward".to_string(),
                properties: Default::default(),
                geometry: MultiPolygon::new(vec![polygon![
                    (x: -84.40, y: 33.75),
                    (x: -84.38, y: 33.75),
                    (x: -84.39, y: 33.76),
                ]]),
            }],
            crimes: vec![CrimeRecord {
                category: "HOMICIDE".to_string(),
                longitude: -84.39,
                latitude: 33.755,
                date: NaiveDate::from_ymd_opt(2015, 3, 14),
                fields: Default::default(),
            }],
        })
    }

    #[test]
    fn ready_page_has_overlay_legend_and_calendar() {
        let config = config();
        let mut session = MapSession::new(&config, Arc::new(CategoryColorMap::default()));
        session.attach(datasets()).unwrap();
        session.set_view(33.755, -84.39, 16);
        session.handle(MapEvent::LegendClick("HOMICIDE".to_string()));

        let html = render_page(&session, &config.tiles);
        assert!(html.contains("<div id=\"map\""));
        assert!(html.contains("<title>Old Fourth Ward</title>"));
        assert_eq!(html.matches("<circle").count(), 1);
        assert!(html.contains("class=\"crimes\" style=\"display:block\""));
        assert!(html.contains("class=\"neighborhoods\" style=\"display:none\""));
        assert!(html.contains("basemaps.cartocdn.com/dark_all/16/"));

        // Selected row links back to the unfiltered view; others select themselves.
        assert!(html.contains("class=\"legend-row selected\""));
        assert!(html.contains("category=AUTO%20THEFT"));
        assert_eq!(html.matches("<a class=\"legend-row").count(), 11);

        assert!(html.contains("<div class=\"calendar\">"));
        assert!(html.contains("2015-03-14: 1"));
    }

    #[test]
    fn failed_page_shows_the_error() {
        let config = config();
        let mut session = MapSession::new(&config, Arc::new(CategoryColorMap::default()));
        session.fail("failed to read crimes from \"x.csv\" <missing>".to_string());

        let html = render_page(&session, &config.tiles);
        assert!(html.contains("notice error"));
        assert!(html.contains("&lt;missing&gt;"));
        assert!(!html.contains("<svg"));
        assert!(!html.contains("class=\"legend\""));
    }

    #[test]
    fn overlay_alone_is_svg() {
        let config = config();
        let mut session = MapSession::new(&config, Arc::new(CategoryColorMap::default()));
        session.attach(datasets()).unwrap();
        let svg = render_overlay(session.scene().unwrap());
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("<path d=\"M"));
    }

    #[test]
    fn hrefs_encode_categories() {
        let view = Viewport::new(33.755, -84.39, 12, 800, 600);
        assert_eq!(
            view_href(&view, Some("LARCENY-FROM VEHICLE")),
            "?lat=33.755000&lon=-84.390000&zoom=12&width=800&height=600&category=LARCENY-FROM%20VEHICLE"
        );
        assert!(view_href(&view, Some("A&B/C~d.e_f")).ends_with("&category=A%26B%2FC~d.e_f"));
        assert_eq!(escape("a&b"), "a&amp;b");
    }
}
