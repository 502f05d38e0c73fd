//! HTTP server for TrackShare: authentication, track uploads and the track
//! lifecycle, exposed as an axum router.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod router;
pub mod state;
pub mod tracks;
pub mod upload;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use router::{build_router, RouterOptions};
pub use state::AppState;
