pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod protocol;
pub mod server;

// Re-export commonly used items
pub use config::{load_reference_context, ServerConfig};
pub use error::ApiError;
pub use server::{ApiServer, AppState};
