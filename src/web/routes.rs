//! Visitor tracking and analytics routes

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::AppState;
use crate::db::{AnalyticsView, NewVisitor, VisitorRecord};
use crate::error::AppError;
use crate::geoip;
use crate::request::{ClientRequest, TrackPayload};
use crate::user_agent;

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub success: bool,
    pub visitor: VisitorRecord,
}

/// POST /api/visitors - record one page view.
///
/// The body is parsed as JSON whatever its content type; a body that is not
/// a JSON object is stored as an empty payload.
pub async fn track_visitor(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TrackResponse>, AppError> {
    let db = state.database()?;

    let payload = TrackPayload::from_body(&body);
    let request = ClientRequest::from_parts(&headers, payload);
    let client = user_agent::classify(&request.user_agent);
    let geo = geoip::locate(state.geo.as_ref(), &request.ip).await;

    let visit = NewVisitor::new(request, client).with_geo(geo);
    let visitor = db.insert_visitor(&visit).await.map_err(AppError::Track)?;

    debug!(
        "Tracked visit to {} from {} ({}, {}, {})",
        visitor.page_visited.as_deref().unwrap_or("-"),
        visitor.ip_address,
        visitor.device_type,
        visitor.browser,
        visitor.os
    );

    Ok(Json(TrackResponse {
        success: true,
        visitor,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// GET /api/visitors?type=stats|countries|daily|recent
pub async fn visitor_analytics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Response, AppError> {
    let db = state.database()?;

    let view: AnalyticsView = query
        .kind
        .as_deref()
        .unwrap_or("stats")
        .parse()
        .map_err(|_| AppError::InvalidType)?;

    let response = match view {
        AnalyticsView::Stats => {
            Json(db.get_stats().await.map_err(AppError::Fetch)?).into_response()
        }
        AnalyticsView::Countries => {
            Json(db.get_country_stats().await.map_err(AppError::Fetch)?).into_response()
        }
        AnalyticsView::Daily => {
            Json(db.get_daily_stats().await.map_err(AppError::Fetch)?).into_response()
        }
        AnalyticsView::Recent => {
            Json(db.get_recent_visitors().await.map_err(AppError::Fetch)?).into_response()
        }
    };

    Ok(response)
}

/// GET /health - liveness
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = if state.db.is_some() {
        "configured"
    } else {
        "not_configured"
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
    }))
}
