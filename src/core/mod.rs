pub mod alignment;
pub mod sessions;
pub mod targets;
