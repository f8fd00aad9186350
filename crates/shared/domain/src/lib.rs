//! Domain layer - Core entities and value objects shared by every service.
//!
//! This crate contains pure domain logic with no infrastructure dependencies.

pub mod constants;
pub mod entity;
pub mod error;
pub mod security;
pub mod sorting;

pub use constants::*;
pub use entity::BaseEntity;
pub use error::{DomainError, DomainResult};
pub use security::AuthUser;
pub use sorting::{Sorting, SortingOrder, SortingSequence};
