use crate::color::CategoryColorMap;
use crate::config::{AppConfig, InputConfig, MapConfig};
use crate::coordinator;
use crate::filter::FilterState;
use crate::projection::{MAX_LATITUDE, Viewport, wrap_longitude};
use crate::scene::{Scene, render_all};
use crate::sync::{sync_positions, sync_zoom_visibility};
use crate::types::Datasets;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("scene was already rendered for this session")]
    AlreadyRendered,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// The map was panned or zoomed and its pixel origin moved.
    ViewReset(Viewport),
    /// The zoom level settled.
    ZoomEnd,
    LegendClick(String),
}

#[derive(Debug)]
pub enum LoadState {
    Pending,
    Ready { datasets: Arc<Datasets>, scene: Scene },
    Failed(String),
}

#[derive(Debug)]
pub struct MapSession {
    map: MapConfig,
    colors: Arc<CategoryColorMap>,
    filter: FilterState,
    viewport: Viewport,
    state: LoadState,
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot<'a> {
    pub viewport: &'a Viewport,
    pub filter: &'a FilterState,
    pub scene: Option<&'a Scene>,
    pub error: Option<&'a str>,
}

impl MapSession {
    pub fn new(config: &AppConfig, colors: Arc<CategoryColorMap>) -> Self {
        let map = config.map.clone();
        let viewport = Viewport::new(map.center_lat, map.center_lon, map.zoom, map.width, map.height);
        Self {
            map,
            colors,
            filter: FilterState::default(),
            viewport,
            state: LoadState::Pending,
        }
    }

    /// Loads both datasets and renders, or records the failure for display.
    pub async fn load(&mut self, input: &InputConfig) -> Result<(), SessionError> {
        if matches!(self.state, LoadState::Ready { .. }) {
            return Err(SessionError::AlreadyRendered);
        }
        match coordinator::load_datasets(input).await {
            Ok(datasets) => self.attach(Arc::new(datasets)),
            Err(err) => {
                self.fail(format!("{err:#}"));
                Ok(())
            }
        }
    }

    /// Draws the scene for freshly loaded data. Only the first call renders.
    pub fn attach(&mut self, datasets: Arc<Datasets>) -> Result<(), SessionError> {
        if matches!(self.state, LoadState::Ready { .. }) {
            return Err(SessionError::AlreadyRendered);
        }
        let scene = render_all(&datasets, &self.colors, self.map.legend);
        debug!(
            paths = scene.paths.len(),
            markers = scene.markers.len(),
            "Scene rendered"
        );
        self.state = LoadState::Ready { datasets, scene };

        // Initial placement, as if the map had just been reset.
        self.handle(MapEvent::ViewReset(self.viewport));
        self.handle(MapEvent::ZoomEnd);
        Ok(())
    }

    pub fn fail(&mut self, message: String) {
        error!(%message, "Data load failed");
        self.state = LoadState::Failed(message);
    }

    /// Applies one map event. Returns `false` when nothing could be redrawn.
    pub fn handle(&mut self, event: MapEvent) -> bool {
        if let MapEvent::ViewReset(viewport) = &event {
            self.viewport = *viewport;
        }

        let LoadState::Ready { datasets, scene } = &mut self.state else {
            debug!(?event, "Ignoring map event before data is loaded");
            return false;
        };

        match event {
            MapEvent::ViewReset(_) => {
                sync_positions(scene, datasets, &self.viewport, &self.filter);
            }
            MapEvent::ZoomEnd => {
                sync_zoom_visibility(scene, self.viewport.zoom, self.map.detail_zoom);
            }
            MapEvent::LegendClick(category) => {
                if scene.legend.is_none() {
                    return false;
                }
                self.filter.toggle(&category);
                sync_positions(scene, datasets, &self.viewport, &self.filter);
            }
        }
        true
    }

    /// Moves the map the way a pan/zoom gesture does: reset, then zoom end.
    pub fn set_view(&mut self, center_lat: f64, center_lon: f64, zoom: u8) -> bool {
        let zoom = zoom.clamp(self.map.min_zoom, self.map.max_zoom);
        let (center_lat, center_lon) = if center_lat.is_finite() && center_lon.is_finite() {
            (center_lat.clamp(-MAX_LATITUDE, MAX_LATITUDE), wrap_longitude(center_lon))
        } else {
            warn!(center_lat, center_lon, "Ignoring non-finite map center");
            (self.viewport.center_lat, self.viewport.center_lon)
        };
        let viewport = Viewport { center_lat, center_lon, zoom, ..self.viewport };
        let reset = self.handle(MapEvent::ViewReset(viewport));
        let zoomed = self.handle(MapEvent::ZoomEnd);
        reset && zoomed
    }

    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let viewport = Viewport { width, height, ..self.viewport };
        self.handle(MapEvent::ViewReset(viewport))
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn map_config(&self) -> &MapConfig {
        &self.map
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn scene(&self) -> Option<&Scene> {
        match &self.state {
            LoadState::Ready { scene, .. } => Some(scene),
            _ => None,
        }
    }

    pub fn datasets(&self) -> Option<&Datasets> {
        match &self.state {
            LoadState::Ready { datasets, .. } => Some(datasets),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            LoadState::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot<'_> {
        SessionSnapshot {
            viewport: &self.viewport,
            filter: &self.filter,
            scene: self.scene(),
            error: self.error(),
        }
    }
}
