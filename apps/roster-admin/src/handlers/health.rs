use crate::AppState;
use axum::{Json, extract::State};
use serde_json::{Value, json};

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let session = state.session().await;
    let status = if session.is_empty() { "empty" } else { "ok" };
    Json(json!({
        "status": status,
        "api_url": state.config.api_url,
        "users": session.users().len(),
        "coupons": session.coupons().len(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
