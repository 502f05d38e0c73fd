pub mod track;
pub mod track_like;
pub mod user;
