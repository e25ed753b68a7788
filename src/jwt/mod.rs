//! Bearer token verification.
//!
//! Every service shares one HS256 secret with the token issuer. Verification
//! always uses HS256; the `alg` field in the token header is never trusted.
//!
//! # Example
//!
//! ```rust
//! use team_service::jwt::{JwtConfig, JwtService};
//!
//! let config = JwtConfig::new("a-shared-secret-of-at-least-32-bytes").unwrap();
//! let service = JwtService::new(config);
//!
//! let token = service.issue("alice").unwrap();
//! let header = format!("Bearer {token}");
//! let actor = service.verify_header(Some(&header)).unwrap();
//! assert_eq!(actor.username(), "alice");
//! ```

mod claims;
mod config;
mod service;

pub use claims::JwtClaims;
pub use config::{JwtConfig, MIN_SECRET_LENGTH};
pub use service::JwtService;
