use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failure to load one of the backend collections.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The projected rows could not be turned into a spreadsheet document.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("row {row} is not a flat record")]
    NotARecord { row: usize },
    #[error("row {row}, column {column:?} holds a non-scalar value")]
    NonScalar { row: usize, column: String },
    #[error("row {row}, column {column:?} exceeds {max} characters")]
    CellTooLong {
        row: usize,
        column: String,
        max: usize,
    },
    #[error("invalid sheet name {0:?}")]
    InvalidSheetName(String),
    #[error("could not encode row: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("could not write workbook container: {0}")]
    Container(#[from] zip::result::ZipError),
    #[error("could not write workbook part: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not save {file_name}: {source}")]
    Save {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not render page: {0}")]
    Template(#[from] askama::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Fetch(_) => StatusCode::BAD_GATEWAY,
            AppError::Serialization(SerializationError::InvalidSheetName(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failures_map_to_bad_gateway() {
        let err = AppError::from(FetchError::Status {
            url: "http://localhost:8000/api/users".to_string(),
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn bad_sheet_name_is_a_client_error() {
        let err = AppError::from(SerializationError::InvalidSheetName("a/b".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = AppError::from(SerializationError::NonScalar {
            row: 0,
            column: "tags".to_string(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
