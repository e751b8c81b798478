use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::client::ApiClient;
use crate::config::AdminConfig;
use crate::export::{self, FileSink};
use crate::projector::{ProjectedRow, ViewQuery};
use crate::{AppState, Session, router};

const TABLE_COLUMNS: [&str; 11] = [
    "Date",
    "Name",
    "Phone",
    "Email",
    "Aadhaar",
    "Booking Date",
    "Coupon",
    "Token",
    "Coupon Reference",
    "User Reference",
    "Event Date",
];

pub fn build_client(config: &AdminConfig) -> Result<ApiClient> {
    ApiClient::with_timeout(
        config.api_url.clone(),
        config.auth_token.clone(),
        config.request_timeout(),
    )
    .context("Failed to build API client")
}

pub async fn run_export(
    config: &AdminConfig,
    query: &ViewQuery,
    name: &str,
    out_dir: Option<&Path>,
) -> Result<PathBuf> {
    let client = build_client(config)?;
    let session = Session::load(&client)
        .await
        .context("Failed to load users and coupons")?;

    let rows = session.project(query);
    let dir = out_dir.unwrap_or(config.export_dir.as_path());
    let path = export::export_rows(&rows, name, &FileSink::new(dir))?;
    Ok(path)
}

pub async fn run_list(config: &AdminConfig, query: &ViewQuery) -> Result<String> {
    let client = build_client(config)?;
    let session = Session::load(&client)
        .await
        .context("Failed to load users and coupons")?;
    Ok(render_table(&session.project(query)))
}

pub async fn run_serve(config: AdminConfig) -> Result<()> {
    let client = build_client(&config)?;

    // A failed initial load leaves the dashboard empty until POST /reload.
    let session = match Session::load(&client).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Initial load failed, starting with an empty session: {}", e);
            Session::empty()
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let app = router(AppState::new(config, client, session));

    info!("Dashboard listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn table_cells(row: &ProjectedRow) -> [String; 11] {
    let user = &row.user;
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    [
        user.created_date().unwrap_or_default().to_string(),
        user.name.clone(),
        text(&user.phone),
        text(&user.email),
        text(&user.aadhaar),
        text(&user.booking_date),
        text(&user.coupon),
        text(&user.token),
        row.coupon_reference.clone(),
        text(&user.reference),
        text(&user.event_date),
    ]
}

/// Plain-text table with the dashboard's columns, padded to the widest cell.
pub fn render_table(rows: &[ProjectedRow]) -> String {
    let cells: Vec<[String; 11]> = rows.iter().map(table_cells).collect();

    let mut widths = TABLE_COLUMNS.map(|c| c.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, TABLE_COLUMNS.iter().copied(), &widths);
    for row in &cells {
        push_line(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_shared::User;

    #[test]
    fn table_lists_header_and_rows() {
        let rows = vec![
            ProjectedRow {
                user: User::new("1", "Alice").with_coupon("C1"),
                coupon_reference: "REF-1".to_string(),
            },
            ProjectedRow {
                user: User::new("2", "Bo"),
                coupon_reference: "-".to_string(),
            },
        ];

        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Date  Name   Phone"));
        assert!(lines[1].contains("Alice"));
        assert!(lines[1].contains("REF-1"));
        assert!(lines[2].contains("Bo"));
        assert!(lines[2].contains("-"));
    }

    #[test]
    fn empty_table_has_only_header() {
        let table = render_table(&[]);
        assert_eq!(table.lines().count(), 1);
        assert!(table.starts_with("Date"));
    }
}
