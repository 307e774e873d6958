pub mod app;
pub mod server;

pub use app::{load_app_config, parse_app_config, AppConfig};
