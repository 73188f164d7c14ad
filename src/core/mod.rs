//! Core services of the clinic backend

pub mod accounts;
pub mod clinic;
pub mod guard;
pub mod payload;
pub mod server;

// Re-export main components for convenience
pub use accounts::AccountService;
pub use clinic::ClinicService;
pub use guard::{ReferentialGuard, WriteStage, WriteTrace};
pub use server::{shutdown_on, AppState};
