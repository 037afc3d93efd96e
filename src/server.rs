use crate::app::{MapEvent, MapSession};
use crate::color::CategoryColorMap;
use crate::config::AppConfig;
use crate::coordinator;
use crate::index::NeighborhoodIndex;
use crate::page;
use crate::types::Datasets;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub struct Loaded {
    pub datasets: Arc<Datasets>,
    pub index: NeighborhoodIndex,
    pub counts: Vec<BTreeMap<String, u32>>,
}

pub struct AppState {
    pub config: AppConfig,
    pub colors: Arc<CategoryColorMap>,
    /// Load failures are kept so every page can show them.
    pub data: Result<Loaded, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
    lat: Option<f64>,
    lon: Option<f64>,
    zoom: Option<u8>,
    width: Option<u32>,
    height: Option<u32>,
    category: Option<String>,
}

#[derive(Deserialize)]
pub struct QueryParams {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
pub struct QueryResponse {
    name: String,
    properties: serde_json::Map<String, serde_json::Value>,
    crimes: BTreeMap<String, u32>,
}

impl AppState {
    pub async fn load(config: AppConfig, colors: Arc<CategoryColorMap>) -> Self {
        let data = match coordinator::load_datasets(&config.input).await {
            Ok(datasets) => {
                let index = NeighborhoodIndex::build(&datasets.neighborhoods);
                let counts = index.category_counts(&datasets.neighborhoods, &datasets.crimes);
                Ok(Loaded { datasets: Arc::new(datasets), index, counts })
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "Serving without data");
                Err(format!("{err:#}"))
            }
        };
        Self { config, colors, data }
    }

    /// A fresh session for one request, moved to the requested view and filter.
    pub fn session(&self, params: &ViewParams) -> MapSession {
        let mut session = MapSession::new(&self.config, self.colors.clone());
        if params.width.is_some() || params.height.is_some() {
            let view = *session.viewport();
            session.resize(
                params.width.unwrap_or(view.width).clamp(64, 4096),
                params.height.unwrap_or(view.height).clamp(64, 4096),
            );
        }
        match &self.data {
            Ok(loaded) => {
                if let Err(err) = session.attach(loaded.datasets.clone()) {
                    warn!(error = %err, "Session could not render");
                }
            }
            Err(message) => session.fail(message.clone()),
        }

        let view = *session.viewport();
        session.set_view(
            params.lat.unwrap_or(view.center_lat),
            params.lon.unwrap_or(view.center_lon),
            params.zoom.unwrap_or(view.zoom),
        );
        if let Some(category) = params.category.as_deref().filter(|c| !c.is_empty()) {
            session.handle(MapEvent::LegendClick(category.to_string()));
        }
        session
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/", get(page_handler))
        .route("/api/scene", get(scene_handler))
        .route("/api/overlay.svg", get(overlay_handler))
        .route("/api/query", get(query_handler))
        .fallback_service(static_files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, colors: Arc<CategoryColorMap>) -> Result<()> {
    let port = config.server.port;
    let state = Arc::new(AppState::load(config, colors).await);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn page_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Response {
    let session = state.session(&params);
    let html = Html(page::render_page(&session, &state.config.tiles));
    if session.error().is_some() {
        (StatusCode::SERVICE_UNAVAILABLE, html).into_response()
    } else {
        html.into_response()
    }
}

async fn scene_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Response {
    let session = state.session(&params);
    let body = Json(session.snapshot()).into_response();
    if session.error().is_some() {
        (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
    } else {
        body
    }
}

async fn overlay_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Response {
    let session = state.session(&params);
    match session.scene() {
        Some(scene) => (
            [(header::CONTENT_TYPE, "image/svg+xml")],
            page::render_overlay(scene),
        )
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<QueryResponse>> {
    let Ok(loaded) = &state.data else {
        return Json(None);
    };
    let neighborhoods = &loaded.datasets.neighborhoods;

    Json(
        loaded
            .index
            .locate(neighborhoods, params.lon, params.lat)
            .map(|i| QueryResponse {
                name: neighborhoods[i].name.clone(),
                properties: neighborhoods[i].properties.clone(),
                crimes: loaded.counts[i].clone(),
            }),
    )
}
