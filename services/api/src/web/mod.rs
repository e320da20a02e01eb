pub mod auth;
pub mod drafts;
pub mod middleware;
pub mod rest;
pub mod router;
pub mod state;

// Re-export what the binaries need to build the server.
pub use middleware::require_auth;
pub use router::build_router;
pub use state::AppState;
