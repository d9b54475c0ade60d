//! Create strategy - first fill of a never-cached folder

use domain::{Event, FolderId};
use tracing::{debug, instrument};

use super::{CacheContext, CachingHandler};
use crate::error::ApplicationError;
use crate::ports::CalendarStoreExt;
use crate::services::event_diff::EventUpdates;

/// Stores every external event of a folder, treating the cached side as empty
#[derive(Debug)]
pub struct CreateHandler<'a> {
    context: CacheContext<'a>,
}

impl<'a> CreateHandler<'a> {
    pub fn new(context: CacheContext<'a>) -> Self {
        Self { context }
    }
}

impl CachingHandler for CreateHandler<'_> {
    fn context(&self) -> &CacheContext<'_> {
        &self.context
    }

    fn external_events(&self, folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError> {
        self.context.fetch_external(folder_id)
    }

    fn existing_events(&self, _folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError> {
        Ok(Vec::new())
    }

    #[instrument(skip(self, diff), fields(folder = %folder_id, added = diff.added.len()))]
    fn persist(&self, folder_id: &FolderId, diff: &EventUpdates) -> Result<(), ApplicationError> {
        if diff.added.is_empty() {
            return Ok(());
        }
        let created = self.context.store().write_with(|storage| {
            self.context.create_events(storage, folder_id, &diff.added)
        })?;
        debug!(created = created.len(), "Created cached events");
        Ok(())
    }

    fn update_last_updated(&self, folder_id: &FolderId) -> Result<(), ApplicationError> {
        self.context.mark_updated(folder_id)
    }
}
