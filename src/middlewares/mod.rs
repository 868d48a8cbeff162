pub mod basic_auth;
pub mod cors;

pub use basic_auth::AdminAuthMiddleware;
pub use cors::create_cors;
