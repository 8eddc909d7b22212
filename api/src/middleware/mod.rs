pub mod auth;

pub use auth::trigger_auth_middleware;
