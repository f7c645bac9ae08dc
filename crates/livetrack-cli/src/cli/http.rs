use std::convert::Infallible;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use livetrack_core::runtime::TrackerHandle;
use livetrack_core::store::{derive_layers, filter_options, stale_selections, OptionField};
use livetrack_core::{FilterKey, FilterState};

/// Shared server state
#[derive(Clone)]
pub struct HttpServerState {
    pub handle: TrackerHandle,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptionsResponse {
    pub field: FilterKey,
    pub options: Vec<String>,
    /// Selected optional filters no longer among the options
    pub stale_selections: Vec<FilterKey>,
}

pub fn router(state: HttpServerState) -> Router {
    Router::new()
        .route("/view", get(get_view))
        .route("/layers", get(get_layers))
        .route("/filters", get(get_filters).put(put_filters))
        .route("/filters/options/:field", get(get_filter_options))
        .route("/refresh", post(refresh))
        .route("/stats", get(get_stats))
        .route("/events", get(events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the tracker API until the listener fails.
pub async fn run_server(bind_addr: &str, handle: TrackerHandle) -> Result<()> {
    let app = router(HttpServerState { handle });

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Tracker API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}

fn unavailable(e: impl std::fmt::Display) -> (StatusCode, String) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        format!("Tracker is not running: {}", e),
    )
}

/// Handler for GET /view
async fn get_view(State(state): State<HttpServerState>) -> impl IntoResponse {
    Json(state.handle.view())
}

/// Handler for GET /layers
async fn get_layers(State(state): State<HttpServerState>) -> impl IntoResponse {
    let view = state.handle.view();
    Json(derive_layers(&view.filtered_view, &view.filters))
}

/// Handler for GET /filters
async fn get_filters(State(state): State<HttpServerState>) -> impl IntoResponse {
    Json(state.handle.view().filters.clone())
}

/// Handler for PUT /filters
async fn put_filters(
    State(state): State<HttpServerState>,
    Json(filters): Json<FilterState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.handle.update_filters(filters).map_err(unavailable)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": true }))))
}

/// Handler for GET /filters/options/:field
async fn get_filter_options(
    Path(field): Path<String>,
    State(state): State<HttpServerState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let field = OptionField::parse(&field)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown filter field: {}", field)))?;

    let view = state.handle.view();
    let organization = view.filters.organization_id.as_deref();
    Ok(Json(FilterOptionsResponse {
        field: field.filter_key(),
        options: filter_options(&view.snapshot, field, organization),
        stale_selections: stale_selections(&view.snapshot, &view.filters),
    }))
}

/// Handler for POST /refresh
async fn refresh(State(state): State<HttpServerState>) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.handle.refresh().map_err(unavailable)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": true }))))
}

/// Handler for GET /stats
async fn get_stats(State(state): State<HttpServerState>) -> impl IntoResponse {
    Json(state.handle.stats())
}

/// Handler for GET /events
async fn events(State(state): State<HttpServerState>) -> impl IntoResponse {
    Sse::new(view_stream(state.handle)).keep_alive(KeepAlive::default())
}

/// One `view` event per published view model, starting with the current one.
fn view_stream(handle: TrackerHandle) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut view_rx = handle.watch_view();
        loop {
            let view = view_rx.borrow_and_update().clone();
            match serde_json::to_string(&view) {
                Ok(json) => {
                    yield Ok(Event::default().event("view").data(json));
                }
                Err(e) => tracing::warn!(error = %e, "Failed to serialize view"),
            }

            if view_rx.changed().await.is_err() {
                // Tracker stopped
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livetrack_core::fetch::{FetchError, StatisticsQuery, StatisticsSource};
    use livetrack_core::reporting::NoopReporter;
    use livetrack_core::{FetchResponse, TrackerConfig, TrackerRuntime};
    use futures::future::BoxFuture;
    use serde_json::Value;
    use std::sync::Arc;

    struct StaticSource;

    impl StatisticsSource for StaticSource {
        fn fetch<'a>(&'a self, _query: &'a StatisticsQuery) -> BoxFuture<'a, Result<FetchResponse, FetchError>> {
            Box::pin(async {
                Ok(FetchResponse::from_data(json!({
                    "sectors_table": [
                        { "id": 1, "organization_id": 2, "nationality": "EG", "boss": "Ali",
                          "latitude": "21.4", "longitude": "39.8" },
                        { "id": 2, "organization_id": 2, "nationality": "SA", "boss": "Sami",
                          "latitude": 0, "longitude": 0 }
                    ],
                    "locations": [
                        { "id": 10, "location_type": "Ticket", "latitude": 21.3, "longitude": 39.9 }
                    ]
                })))
            })
        }
    }

    async fn serve() -> (String, TrackerRuntime) {
        let config = TrackerConfig {
            debounce_ms: 10,
            filters: FilterState::new().with(FilterKey::OrganizationId, "2"),
            ..Default::default()
        };
        let runtime = TrackerRuntime::start(&config, Arc::new(StaticSource), Arc::new(NoopReporter));
        let handle = runtime.handle();
        handle
            .watch_view()
            .wait_for(|view| !view.is_initial_loading)
            .await
            .unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(HttpServerState { handle })).await.unwrap();
        });
        (format!("http://{}", addr), runtime)
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn test_view_and_filters() {
        let (base, runtime) = serve().await;

        let view: Value = client().get(format!("{}/view", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(view["isInitialLoading"], false);
        assert_eq!(view["filteredView"]["sectors_table"].as_array().unwrap().len(), 2);
        assert_eq!(view["filterStats"]["originalCount"], 2);

        let response = client()
            .put(format!("{}/filters", base))
            .json(&json!({ "organization_id": 2, "nationality_id": "EG", "action_type": "all" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

        runtime
            .handle()
            .watch_view()
            .wait_for(|view| view.filters.nationality_id.is_some())
            .await
            .unwrap();

        let filters: Value = client().get(format!("{}/filters", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(filters["nationality_id"], "EG");

        let layers: Value = client().get(format!("{}/layers", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(layers["mode"], "all");
        assert_eq!(layers["sectors"].as_array().unwrap().len(), 1);
        assert_eq!(layers["locations"].as_array().unwrap().len(), 1);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_filter_options() {
        let (base, runtime) = serve().await;

        let response: Value = client()
            .get(format!("{}/filters/options/boss", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["field"], "boss_id");
        assert_eq!(response["options"], json!(["Ali", "Sami"]));

        let missing = client()
            .get(format!("{}/filters/options/colour", base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_refresh_and_stats() {
        let (base, runtime) = serve().await;

        let response = client().post(format!("{}/refresh", base)).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

        runtime
            .handle()
            .watch_view()
            .wait_for(|view| view.snapshot_version >= 2 && !view.is_updating)
            .await
            .unwrap();

        let stats: Value = client().get(format!("{}/stats", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(stats["fetchesIssued"], 2);
        assert_eq!(stats["fetchesSucceeded"], 2);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_view_stream_ends_with_tracker() {
        use futures::StreamExt;

        let (_base, runtime) = serve().await;
        let mut stream = Box::pin(view_stream(runtime.handle()));
        assert!(stream.next().await.unwrap().is_ok());

        runtime.shutdown().await;
        let mut remaining = 0;
        while stream.next().await.is_some() {
            remaining += 1;
        }
        assert!(remaining <= 2);
    }

    #[tokio::test]
    async fn test_refresh_after_shutdown_is_unavailable() {
        let (base, runtime) = serve().await;
        runtime.shutdown().await;

        let response = client().post(format!("{}/refresh", base)).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    }
}
