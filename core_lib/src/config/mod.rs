pub mod settings;

pub use settings::{AppConfig, CorsConfig, DatabaseConfig, FileConfig, RateLimitConfig, ServerConfig};
