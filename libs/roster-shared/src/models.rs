use serde::{Deserialize, Serialize};

/// A registered user as returned by `GET /api/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aadhaar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Filled in by staff, unrelated to the coupon's own reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: None,
            email: None,
            aadhaar: None,
            booking_date: None,
            event_date: None,
            coupon: None,
            token: None,
            reference: None,
            created_at: None,
        }
    }

    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon = Some(code.into());
        self
    }

    /// Date part (`YYYY-MM-DD`) of the creation timestamp.
    pub fn created_date(&self) -> Option<&str> {
        let created = self.created_at.as_deref()?;
        match created.char_indices().nth(10) {
            Some((idx, _)) => Some(&created[..idx]),
            None => Some(created),
        }
    }
}

/// An issued coupon as returned by `GET /api/coupons`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    #[serde(rename = "Coupons", alias = "code")]
    pub code: Option<String>,
    #[serde(rename = "Reference", alias = "reference")]
    pub reference: Option<String>,
}

impl Coupon {
    pub fn new(code: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            reference: Some(reference.into()),
        }
    }
}
