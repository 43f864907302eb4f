pub mod jwks;

pub use jwks::{AuthError, AuthUser, JwksClient};
