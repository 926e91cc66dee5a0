//! Authentication Module
//! Mission: JWT access tokens, refresh token rotation, and RBAC

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod refresh_store;
pub mod service;
pub mod user_store;

pub use api::AuthState;
pub use jwt::JwtHandler;
pub use middleware::auth_middleware;
pub use refresh_store::RefreshTokenStore;
pub use service::AuthService;
pub use user_store::UserStore;
