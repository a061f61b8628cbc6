pub mod download;
pub mod media;
pub mod relations;
pub mod user;
