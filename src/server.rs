use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{validate_user_id, ApiBadgesResponse, ApiError, ContextQuery, HealthResponse};
use learning_context::{ContextBuilder, MasterContext};

#[derive(Clone)]
struct AppState {
    builder: Arc<ContextBuilder>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub async fn serve(args: crate::ServeArgs, builder: Arc<ContextBuilder>) -> Result<(), String> {
    let app = router(builder);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|err| format!("invalid bind address: {}", err))?;

    info!(%addr, "serving learning contexts");
    axum::serve(tokio::net::TcpListener::bind(addr).await.map_err(|err| {
        format!("failed to bind server: {}", err)
    })?, app)
    .await
    .map_err(|err| format!("server error: {}", err))?;

    Ok(())
}

fn router(builder: Arc<ContextBuilder>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/context/:user_id", get(context_handler))
        .route("/api/context/:user_id/badges", get(badges_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { builder })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

async fn context_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ContextQuery>,
) -> ApiResult<MasterContext> {
    let user_id = validate_user_id(&user_id).map_err(bad_request)?;
    let context = state.builder.build(&user_id, query.force_refresh()).await;
    Ok(Json(context))
}

async fn badges_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ContextQuery>,
) -> ApiResult<ApiBadgesResponse> {
    let user_id = validate_user_id(&user_id).map_err(bad_request)?;
    let context = state.builder.build(&user_id, query.force_refresh()).await;
    Ok(Json(ApiBadgesResponse::from_context(context)))
}

fn bad_request(error: String) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(ApiError { error }))
}
