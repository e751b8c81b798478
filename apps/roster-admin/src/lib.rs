//! Admin reporting for roster users.
//!
//! Users and coupons are loaded from the backend API into a [`Session`],
//! joined and filtered by the [`projector`], and exported as spreadsheets by
//! [`export`]. The same pipeline is reachable from the CLI and from a small
//! HTTP dashboard.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod handlers;
pub mod projector;
pub mod session;

use client::ApiClient;
use config::AdminConfig;
use error::FetchError;
pub use session::Session;

#[derive(Clone)]
pub struct AppState {
    pub config: AdminConfig,
    pub client: ApiClient,
    session: Arc<RwLock<Arc<Session>>>,
}

impl AppState {
    pub fn new(config: AdminConfig, client: ApiClient, session: Session) -> Self {
        Self {
            config,
            client,
            session: Arc::new(RwLock::new(Arc::new(session))),
        }
    }

    /// Current snapshot; stays valid even if a reload swaps it out.
    pub async fn session(&self) -> Arc<Session> {
        self.session.read().await.clone()
    }

    /// Loads a fresh session and publishes it only if both fetches succeed.
    pub async fn reload(&self) -> Result<Arc<Session>, FetchError> {
        let fresh = Arc::new(Session::load(&self.client).await?);
        *self.session.write().await = fresh.clone();
        Ok(fresh)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/users", get(handlers::users::users_page))
        .route("/users/export", get(handlers::users::export_users))
        .route("/api/users", get(handlers::users::users_json))
        .route("/reload", post(handlers::session::reload_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Collections;
    use axum::{
        Json,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use calamine::{Data, Reader, Xlsx};
    use roster_shared::{Coupon, User};
    use serde_json::{Value, json};
    use std::io::Cursor;
    use tower::ServiceExt;

    fn seeded_state(api_url: &str) -> AppState {
        let mut alice = User::new("u1", "Alice").with_coupon("SPRING");
        alice.created_at = Some("2024-02-28T10:11:12.000Z".to_string());
        let session = Session::from_collections(Collections {
            users: vec![User::new("u2", "bob"), alice, User::new("u3", "Malik")],
            coupons: vec![Coupon::new("SPRING", "REF-SPRING")],
        });
        let config = AdminConfig::default().with_api_url(api_url);
        let client = ApiClient::new(config.api_url.clone(), None);
        AppState::new(config, client, session)
    }

    async fn send_get(state: AppState, uri: &str) -> axum::response::Response {
        router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn health_reports_session_size() {
        let response = send_get(seeded_state("http://localhost:8000"), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["users"], 3);
        assert_eq!(body["coupons"], 1);
    }

    #[tokio::test]
    async fn health_flags_an_unloaded_session() {
        let config = AdminConfig::default();
        let client = ApiClient::new(config.api_url.clone(), None);
        let state = AppState::new(config, client, Session::empty());

        let response = send_get(state, "/health").await;
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "empty");
        assert_eq!(body["users"], 0);
    }

    #[tokio::test]
    async fn api_users_applies_filter_and_sort() {
        let response = send_get(seeded_state("http://localhost:8000"), "/api/users?filter=AL&sort=desc").await;
        assert_eq!(response.status(), StatusCode::OK);

        let rows: Vec<Value> = serde_json::from_slice(&body_bytes(response).await).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Malik", "Alice"]);
        assert_eq!(rows[1]["couponReference"], "REF-SPRING");
        assert_eq!(rows[0]["couponReference"], "-");
    }

    #[tokio::test]
    async fn users_page_renders_rows() {
        let response = send_get(seeded_state("http://localhost:8000"), "/users?filter=ali").await;
        assert_eq!(response.status(), StatusCode::OK);

        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(html.contains("<td>Alice</td>"));
        assert!(html.contains("<td>2024-02-28</td>"));
        assert!(html.contains("<td>REF-SPRING</td>"));
        assert!(!html.contains("<td>bob</td>"));
        assert!(html.contains("sort=desc"));
    }

    #[tokio::test]
    async fn export_downloads_projected_rows() {
        let response = send_get(seeded_state("http://localhost:8000"), "/users/export?sort=asc").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            export::CONTENT_TYPE
        );
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.contains("filename=\"Users.xlsx\""));

        let bytes = body_bytes(response).await;
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range("Users").unwrap();
        let names: Vec<Data> = range.rows().skip(1).map(|r| r[1].clone()).collect();
        assert_eq!(
            names,
            vec![
                Data::String("Alice".to_string()),
                Data::String("bob".to_string()),
                Data::String("Malik".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn export_rejects_invalid_sheet_name() {
        let response = send_get(seeded_state("http://localhost:8000"), "/users/export?name=a%2Fb").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_session() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let backend = Router::new()
            .route("/api/users", axum::routing::get(|| async { Json(json!([{"_id": "n1", "name": "New"}])) }))
            .route("/api/coupons", axum::routing::get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        tokio::spawn(async move {
            axum::serve(listener, backend).await.unwrap();
        });

        let state = seeded_state(&format!("http://{}", addr));
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(state.session().await.users().len(), 3);
    }

    #[tokio::test]
    async fn successful_reload_replaces_session() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let backend = Router::new()
            .route("/api/users", axum::routing::get(|| async { Json(json!([{"_id": "n1", "name": "New"}])) }))
            .route("/api/coupons", axum::routing::get(|| async { Json(json!([])) }));
        tokio::spawn(async move {
            axum::serve(listener, backend).await.unwrap();
        });

        let state = seeded_state(&format!("http://{}", addr));
        let session = state.reload().await.unwrap();

        assert_eq!(session.users().len(), 1);
        assert_eq!(state.session().await.users()[0].name, "New");
    }
}
