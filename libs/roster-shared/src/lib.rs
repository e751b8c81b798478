//! Wire records shared between the roster backend API and the admin tools.

pub mod models;

pub use models::{Coupon, User};
