use axum::{
    extract::{ConnectInfo, State},
    http::{header::HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use super::client_ip::extract_client_ip;
use super::decision::{decide, Decision, Policy};
use crate::geoip::CountryLookup;

pub struct AuthzState {
    pub policy: Policy,
    pub classifier: Arc<dyn CountryLookup>,
}

#[derive(Serialize)]
pub struct DecisionResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// Authorize a request by the geolocation of its client address
pub async fn authorize(
    State(state): State<Arc<AuthzState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let client_ip = extract_client_ip(&headers, addr.ip());
    tracing::debug!(client_ip = %client_ip, "Request from IP");

    match decide(&client_ip, &state.policy, state.classifier.as_ref()) {
        Decision::Allow => (
            StatusCode::OK,
            Json(DecisionResponse {
                status: "allowed",
                reason: None,
            }),
        ),
        Decision::Deny(reason) => {
            tracing::debug!(client_ip = %client_ip, reason = %reason, "Request denied");
            (
                StatusCode::FORBIDDEN,
                Json(DecisionResponse {
                    status: "denied",
                    reason: Some(reason.as_str()),
                }),
            )
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
