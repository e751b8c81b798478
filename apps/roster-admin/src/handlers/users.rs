use crate::AppState;
use crate::error::AppError;
use crate::export;
use crate::projector::{ProjectedRow, SortOrder, ViewQuery};
use askama::Template;
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderValue, header},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

pub const DEFAULT_EXPORT_NAME: &str = "Users";

struct UserRowView {
    date: String,
    name: String,
    phone: String,
    email: String,
    aadhaar: String,
    booking_date: String,
    coupon: String,
    token: String,
    coupon_reference: String,
    reference: String,
    event_date: String,
}

impl From<ProjectedRow> for UserRowView {
    fn from(row: ProjectedRow) -> Self {
        let date = row.user.created_date().unwrap_or_default().to_string();
        let user = row.user;
        Self {
            date,
            name: user.name,
            phone: user.phone.unwrap_or_default(),
            email: user.email.unwrap_or_default(),
            aadhaar: user.aadhaar.unwrap_or_default(),
            booking_date: user.booking_date.unwrap_or_default(),
            coupon: user.coupon.unwrap_or_default(),
            token: user.token.unwrap_or_default(),
            coupon_reference: row.coupon_reference,
            reference: user.reference.unwrap_or_default(),
            event_date: user.event_date.unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "users.html")]
struct UsersTemplate {
    rows: Vec<UserRowView>,
    filter: String,
    sort: &'static str,
    sort_arrow: &'static str,
    toggle_href: String,
    export_href: String,
    shown: usize,
    total: usize,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub sort: SortOrder,
    pub name: Option<String>,
}

fn users_href(filter: &str, sort: SortOrder) -> String {
    format!(
        "/users?filter={}&sort={}",
        urlencoding::encode(filter),
        sort.as_str()
    )
}

fn export_href(filter: &str, sort: SortOrder) -> String {
    format!(
        "/users/export?filter={}&sort={}",
        urlencoding::encode(filter),
        sort.as_str()
    )
}

pub async fn users_page(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Html<String>, AppError> {
    let session = state.session().await;
    let rows = session.project(&query);

    let page = UsersTemplate {
        shown: rows.len(),
        total: session.users().len(),
        rows: rows.into_iter().map(UserRowView::from).collect(),
        sort: query.sort.as_str(),
        sort_arrow: match query.sort {
            SortOrder::Ascending => "↓",
            SortOrder::Descending => "↑",
        },
        toggle_href: users_href(&query.filter, query.sort.toggle()),
        export_href: export_href(&query.filter, query.sort),
        filter: query.filter,
    };

    Ok(Html(page.render()?))
}

pub async fn users_json(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Json<Vec<ProjectedRow>> {
    Json(state.session().await.project(&query))
}

pub async fn export_users(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let name = query
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_EXPORT_NAME.to_string());
    let view = ViewQuery::new(query.filter, query.sort);

    let rows = state.session().await.project(&view);
    let export = export::build_export(&rows, &name)?;
    info!(
        "Serving export {} ({} rows, {} bytes)",
        export.file_name,
        rows.len(),
        export.bytes.len()
    );

    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static(export::CONTENT_TYPE),
        ),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&export.file_name),
        ),
    ];
    Ok((headers, export.bytes).into_response())
}

fn content_disposition(file_name: &str) -> HeaderValue {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_escapes_unsafe_names() {
        let value = content_disposition("Users.xlsx");
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"Users.xlsx\"; filename*=UTF-8''Users.xlsx"
        );

        let value = content_disposition("Gäste \"neu\".xlsx");
        let text = value.to_str().unwrap();
        assert!(text.starts_with("attachment; filename=\"G_ste _neu_.xlsx\""));
        assert!(text.contains("filename*=UTF-8''G%C3%A4ste%20%22neu%22.xlsx"));
    }

    #[test]
    fn toggle_link_keeps_filter() {
        assert_eq!(
            users_href("al i", SortOrder::Descending),
            "/users?filter=al%20i&sort=desc"
        );
        assert_eq!(export_href("", SortOrder::Ascending), "/users/export?filter=&sort=asc");
    }
}
