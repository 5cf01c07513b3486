//! API response types, extractors and pagination utilities

pub mod extract;
pub mod pagination;
pub mod response;

pub use extract::{AppJson, AppQuery};
pub use pagination::{Paginated, PaginationParams};
pub use response::{Created, DataResponse, MessageResponse, NoContent};
