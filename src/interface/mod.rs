pub mod notification;
pub mod repository;
pub mod volume_probe;
