//! Vet Clinic - an authenticated record-keeping backend for a veterinary clinic
//!
//! Cats, their visits and the treatments given during them, served over a
//! JSON API behind stateless access and refresh tokens with role gating.

pub mod auth;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod security;
pub mod storage;

// Re-export main components
pub use config::*;
pub use constants::*;
pub use error::{Result, TokenError, VetClinicError};
