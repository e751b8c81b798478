use crate::AppState;
use crate::error::AppError;
use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::info;

/// Reloads both collections. The previous snapshot stays in place when the
/// load fails.
pub async fn reload_session(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let session = state.reload().await?;
    info!(
        "Session reloaded: {} users, {} coupons",
        session.users().len(),
        session.coupons().len()
    );
    Ok(Json(json!({
        "users": session.users().len(),
        "coupons": session.coupons().len()
    })))
}
