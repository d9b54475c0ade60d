//! Delete strategy - drops a folder from the cache

use domain::{Event, FolderId};
use tracing::{debug, instrument};

use super::{CacheContext, CachingHandler, DeletionLog};
use crate::error::ApplicationError;
use crate::ports::CalendarStoreExt;
use crate::services::event_diff::EventUpdates;

/// Removes every cached event of a folder, writing tombstones
#[derive(Debug)]
pub struct DeleteHandler<'a> {
    context: CacheContext<'a>,
}

impl<'a> DeleteHandler<'a> {
    pub fn new(context: CacheContext<'a>) -> Self {
        Self { context }
    }
}

impl CachingHandler for DeleteHandler<'_> {
    fn context(&self) -> &CacheContext<'_> {
        &self.context
    }

    fn external_events(&self, _folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError> {
        Ok(Vec::new())
    }

    fn existing_events(&self, folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError> {
        self.context.all_cached_events(folder_id)
    }

    #[instrument(skip(self, diff), fields(folder = %folder_id, removed = diff.removed.len()))]
    fn persist(&self, folder_id: &FolderId, diff: &EventUpdates) -> Result<(), ApplicationError> {
        if diff.is_empty() {
            return Ok(());
        }
        let deleted = self.context.store().write_with(|storage| {
            let mut log = DeletionLog::default();
            self.context.delete_events(storage, &diff.removed, &mut log)?;
            self.context.prune_exception_dates(storage, &log)?;
            Ok(log.len())
        })?;
        debug!(deleted, "Dropped cached events");
        Ok(())
    }

    fn update_last_updated(&self, folder_id: &FolderId) -> Result<(), ApplicationError> {
        self.context.clear_last_update(folder_id)
    }
}
