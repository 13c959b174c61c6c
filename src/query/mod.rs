//! List-query subsystem.
//!
//! # Data Flow
//! ```text
//! raw query string
//!     → resolver.rs (control keys, sort, populate, filter operators)
//!     → QueryDescriptor
//!     → merge.rs (+ endpoint's ForcedScope)
//!     → ListRequest { where, orderBy, skip/take, include }
//!     → store::list (find_many + count)
//!     → pagination.rs (PaginationMeta)
//! ```
//!
//! # Design Decisions
//! - Resolution never fails; bad input degrades to defaults
//! - Scope filters are merged explicitly, never by implicit key spreading
//! - Every ordering ends with `createdAt desc` so pages are stable

pub mod descriptor;
pub mod filter;
pub mod merge;
pub mod pagination;
pub mod resolver;

pub use descriptor::{Condition, Populate, QueryDescriptor, SortKey, SortOrder};
pub use filter::{Filter, FilterOp};
pub use merge::{merge, ForcedScope, Include, IncludeMap, ListRequest, WhereClause};
pub use pagination::{Paginated, Pagination, PaginationMeta};
pub use resolver::QueryResolver;
