pub mod analytics;
pub mod error;
pub mod handlers;
pub mod links;
pub mod routes;
pub mod user;

pub use handlers::AppState;
pub use routes::create_api_router;
