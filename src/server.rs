use crate::config::AppConfig;
use crate::legend::Legend;
use crate::render::{self, Choropleth, CountyShape, Surface};
use crate::tooltip::Tooltip;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::{Html, Json},
    routing::get,
    Router,
};
use geo::{BoundingRect, Contains, Point};
use geojson::FeatureCollection;
use rstar::{RTree, RTreeObject, AABB};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

// Wrapper for RTree indexing
pub struct CountyIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for CountyIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct AppState {
    pub page: String,
    pub counties: Vec<CountyShape>,
    pub tree: RTree<CountyIndex>,
    pub legend: Legend,
    pub features: FeatureCollection,
}

/// A point in map (SVG viewBox) coordinates.
#[derive(Deserialize)]
pub struct QueryParams {
    x: f64,
    y: f64,
}

impl AppState {
    /// Draws the map once; every request is answered from this snapshot.
    pub fn new(config: &AppConfig, map: &Choropleth) -> Self {
        let mut surface = Surface::default();
        map.draw(&mut surface);
        let page = render::render_page(&surface, &config.render);
        let counties: Vec<CountyShape> = surface.counties().cloned().collect();

        let tree_items: Vec<CountyIndex> = counties
            .iter()
            .enumerate()
            .filter_map(|(i, county)| {
                let rect = county.projected.bounding_rect()?;
                Some(CountyIndex {
                    index: i,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        Self {
            page,
            counties,
            tree: RTree::bulk_load(tree_items),
            legend: map.legend.clone(),
            features: map.to_feature_collection(),
        }
    }

    pub fn county_at(&self, x: f64, y: f64) -> Option<&CountyShape> {
        let point = Point::new(x, y);
        let envelope = AABB::from_point([x, y]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|candidate| self.counties.get(candidate.index))
            .find(|county| county.projected.contains(&point))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/api/query", get(query_handler))
        .route("/api/legend", get(legend_handler))
        .route("/api/counties", get(counties_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, map: Choropleth) -> Result<()> {
    info!("Building spatial index for API...");
    let state = Arc::new(AppState::new(&config, &map));
    info!(counties = state.counties.len(), "Spatial index built");

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn page_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.page.clone())
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<Tooltip>> {
    let tooltip = state.county_at(params.x, params.y).map(|county| {
        let mut tooltip = Tooltip::default();
        tooltip.show(county.fips, county.record.as_ref(), (params.x, params.y));
        tooltip
    });
    Json(tooltip)
}

async fn legend_handler(State(state): State<Arc<AppState>>) -> Json<Legend> {
    Json(state.legend.clone())
}

async fn counties_handler(State(state): State<Arc<AppState>>) -> Json<FeatureCollection> {
    Json(state.features.clone())
}
