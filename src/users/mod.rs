#[cfg(test)]
pub mod memory;
pub mod model;
pub mod repo;
mod repo_types;

pub use model::{Account, ClientStatus, OnboardingProfile, UserDocument};
pub use repo::{PgUserStore, UserStore};
