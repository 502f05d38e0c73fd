use std::sync::Arc;

use trackshare_db::{TrackRepository, UserRepository};
use trackshare_storage::StorageBackend;

use crate::config::{JwtConfig, UploadLimits};
use crate::tracks::TrackService;

/// Shared by every handler as `State<Arc<AppState>>`.
pub struct AppState {
    pub jwt: JwtConfig,
    pub users: Arc<dyn UserRepository>,
    pub tracks: TrackService,
    pub storage: Arc<dyn StorageBackend>,
    pub upload_limits: UploadLimits,
}

impl AppState {
    pub fn new(
        jwt: JwtConfig,
        users: Arc<dyn UserRepository>,
        tracks: Arc<dyn TrackRepository>,
        storage: Arc<dyn StorageBackend>,
        upload_limits: UploadLimits,
    ) -> Self {
        let tracks = TrackService::new(tracks, users.clone(), storage.clone());
        Self {
            jwt,
            users,
            tracks,
            storage,
            upload_limits,
        }
    }
}
