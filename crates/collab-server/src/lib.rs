pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod policy;
pub mod routes;
pub mod services;
pub mod store;
pub mod token;

pub use config::Config;
pub use error::AppError;
pub use routes::{create_router, AppState};
