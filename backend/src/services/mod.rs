pub mod image_service;
pub mod record_service;
pub mod wheel_service;
