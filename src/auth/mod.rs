//! Authentication for the weather server
//!
//! Credential issuance and verification, bearer tokens, and the access
//! guard that fronts protected routes.

pub mod guard;
pub mod handlers;
mod password;
mod service;
mod token;

pub use guard::{authorize, require_auth, AuthenticatedUser};
pub use password::{hash_password, verify_password};
pub use service::{AuthGrant, AuthService};
pub use token::{Claims, TokenIssuer};
