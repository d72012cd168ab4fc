//! Read-side of the store: filters, paging, derived views and the HTTP API.

pub mod api;
mod filter;
mod paging;
mod service_map;

pub use api::{query_router, QueryApiState, QueryError, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use filter::{LogFilter, MetricFilter, Predicate, SpanFilter, TimeWindow, TraceFilter};
pub use paging::{paginate, PagedResult};
pub use service_map::{build_service_map, ServiceEdge, ServiceMap};
