//! Caching strategies
//!
//! A caching cycle fetches the external snapshot of a folder, loads the
//! cached side, diffs them and persists the difference. The three
//! strategies differ in which side they read and in what they persist:
//!
//! - [`CreateHandler`] fills an empty folder from the external source
//! - [`UpdateHandler`] reconciles a cached folder with the external source
//! - [`DeleteHandler`] drops a folder from the cache

mod context;
mod create_handler;
mod delete_handler;
mod update_handler;

pub use context::{CacheContext, DeletionLog};
pub use create_handler::CreateHandler;
pub use delete_handler::DeleteHandler;
pub use update_handler::UpdateHandler;

use domain::{Event, FolderId};
use tracing::{instrument, warn};

use crate::error::ApplicationError;
use crate::services::event_diff::EventUpdates;

/// Summary of one caching cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOutcome {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    /// Cached events of the folder after the cycle
    pub events: Vec<Event>,
}

impl CacheOutcome {
    /// Check whether the cycle wrote no events
    pub const fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.updated == 0
    }
}

/// One way of bringing a cached folder in line with the external source
pub trait CachingHandler {
    /// Shared collaborators and helpers
    fn context(&self) -> &CacheContext<'_>;

    /// Events the folder should hold after the cycle
    fn external_events(&self, folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError>;

    /// Events the folder holds now
    fn existing_events(&self, folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError>;

    /// Apply `diff` to the cache
    fn persist(&self, folder_id: &FolderId, diff: &EventUpdates) -> Result<(), ApplicationError>;

    /// Update the folder's synchronization bookkeeping
    fn update_last_updated(&self, folder_id: &FolderId) -> Result<(), ApplicationError>;

    /// Run a full cycle and read the folder back
    ///
    /// Bookkeeping failures are logged and do not abort the cycle.
    #[instrument(skip_all, fields(folder = %folder_id))]
    fn cache_folder(&self, folder_id: &FolderId) -> Result<CacheOutcome, ApplicationError> {
        if let Err(e) = self.update_last_updated(folder_id) {
            warn!(error = %e, "Failed to update folder bookkeeping");
        }

        let external = self.external_events(folder_id)?;
        let existing = self.existing_events(folder_id)?;
        let diff = self.context().diff_engine().diff(&existing, &external);
        self.persist(folder_id, &diff)?;

        Ok(CacheOutcome {
            added: diff.added.len(),
            removed: diff.removed.len(),
            updated: diff.updated.len(),
            events: self.context().cached_events(folder_id)?,
        })
    }
}

/// The closed set of caching strategies
#[derive(Debug)]
pub enum CachingStrategy<'a> {
    Create(CreateHandler<'a>),
    Update(UpdateHandler<'a>),
    Delete(DeleteHandler<'a>),
}

impl<'a> CachingStrategy<'a> {
    pub fn create(context: CacheContext<'a>) -> Self {
        Self::Create(CreateHandler::new(context))
    }

    pub fn update(context: CacheContext<'a>) -> Self {
        Self::Update(UpdateHandler::new(context))
    }

    pub fn delete(context: CacheContext<'a>) -> Self {
        Self::Delete(DeleteHandler::new(context))
    }

    /// Strategy name for logs
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }

    fn handler(&self) -> &dyn CachingHandler {
        match self {
            Self::Create(handler) => handler,
            Self::Update(handler) => handler,
            Self::Delete(handler) => handler,
        }
    }
}

impl CachingHandler for CachingStrategy<'_> {
    fn context(&self) -> &CacheContext<'_> {
        self.handler().context()
    }

    fn external_events(&self, folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError> {
        self.handler().external_events(folder_id)
    }

    fn existing_events(&self, folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError> {
        self.handler().existing_events(folder_id)
    }

    fn persist(&self, folder_id: &FolderId, diff: &EventUpdates) -> Result<(), ApplicationError> {
        self.handler().persist(folder_id, diff)
    }

    fn update_last_updated(&self, folder_id: &FolderId) -> Result<(), ApplicationError> {
        self.handler().update_last_updated(folder_id)
    }
}
