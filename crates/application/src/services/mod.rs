//! Application services - Use case implementations

pub mod caching;
mod caching_service;
mod event_diff;
mod range_filter;

pub use caching::{
    CacheContext, CacheOutcome, CachingHandler, CachingStrategy, CreateHandler, DeleteHandler,
    DeletionLog, UpdateHandler,
};
pub use caching_service::CachingService;
pub use event_diff::{
    CollectionUpdate, DiffEngine, DiffPolicy, EventUpdate, EventUpdates, ItemUpdate,
};
pub use range_filter::RangeFilter;
