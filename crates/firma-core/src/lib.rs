//! Domain logic for the Firma signature request workflow
//!
//! This crate holds the pieces of the workflow that do not touch
//! storage or the network: the request state machine, the capability
//! token service, OTP generation and hashing, and the per-client
//! rate limiter.

pub mod otp;
pub mod rate_limit;
pub mod status;
pub mod token;

pub use rate_limit::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use status::{AuditAction, DocumentType, RequestStatus};
pub use token::{TokenError, TokenService};
