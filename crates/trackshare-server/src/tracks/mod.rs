pub mod response;
pub mod service;

pub use response::{
    LikeResponse, MessageResponse, PageRequest, PaginatedResponse, TrackOwner, TrackResponse,
};
pub use service::{parse_status_filter, OwnerFields, TrackInput, TrackService};
