//! Authentication and authorization for the clinic API
//!
//! Bearer JWTs are validated once by [`auth_middleware`], which stores the
//! resulting [`AuthenticatedUser`] in the request extensions. Handlers take
//! the user as an extractor and check roles inline.

pub mod config;
pub mod error;
pub mod middleware;
pub mod types;

pub use config::AuthConfig;
pub use error::AuthError;
pub use middleware::{auth_middleware, AuthMiddlewareState};
pub use types::AuthenticatedUser;
