pub mod health;
pub use self::health::health;

pub mod auth;
pub mod me;

use axum::response::IntoResponse;

/// Service banner for the bare root path.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
