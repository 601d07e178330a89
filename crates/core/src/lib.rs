//! Core business logic for the admissions portal.

pub mod pagination;
pub mod services;

pub use pagination::{Paginated, Pagination};
pub use services::*;
