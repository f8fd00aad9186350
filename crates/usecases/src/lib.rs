//! Use case building blocks.
//!
//! - [`Usecase`]: one application operation
//! - [`UsecaseBase`]: store access and logging shared by use cases
//! - [`Pagination`] and [`ListRequest`]: opaque cursors for list endpoints
//! - [`Container`]: process-wide registry of settings, store and services

pub mod container;
pub mod pagination;
pub mod usecase;

pub use container::Container;
pub use pagination::{ListRequest, Pagination};
pub use usecase::{Usecase, UsecaseBase};
