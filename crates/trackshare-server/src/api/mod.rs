pub mod media;
pub mod music;
pub mod users;
