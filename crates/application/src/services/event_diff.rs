//! Event diff engine
//!
//! Compares the cached events of a folder with a fresh external snapshot and
//! partitions them into added, removed and updated events. Updated events
//! carry nested attendee and alarm diffs.

use std::collections::{BTreeSet, HashMap, HashSet};

use domain::{Alarm, Attendee, Event, EventField, RecurrenceId};
use tracing::warn;

/// Old and new version of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpdate<T> {
    pub original: T,
    pub update: T,
}

/// Added, removed and updated members of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionUpdate<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
    pub updated: Vec<ItemUpdate<T>>,
}

impl<T> Default for CollectionUpdate<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            updated: Vec::new(),
        }
    }
}

impl<T> CollectionUpdate<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// A matched pair of cached and fetched event that differ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventUpdate {
    pub original: Event,
    pub update: Event,
    /// Changed fields, ignored fields excluded
    pub updated_fields: BTreeSet<EventField>,
    pub attendee_updates: CollectionUpdate<Attendee>,
    pub alarm_updates: CollectionUpdate<Alarm>,
}

/// Result of diffing cached against fetched events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventUpdates {
    pub added: Vec<Event>,
    pub removed: Vec<Event>,
    pub updated: Vec<EventUpdate>,
    /// Cached events matched by an identical fetched event. Not a change.
    pub unchanged: Vec<Event>,
}

impl EventUpdates {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }

    /// Check whether every updated candidate can be matched by uid.
    /// Vacuously true without updates.
    pub fn updates_have_resolvable_uids(&self) -> bool {
        self.updated
            .iter()
            .all(|u| u.update.resolvable_uid().is_some())
    }
}

/// Which differences count as a change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPolicy {
    ignored: BTreeSet<EventField>,
    compare_alarms: bool,
}

impl DiffPolicy {
    /// Ignore server-assigned bookkeeping fields only
    #[must_use]
    pub fn bookkeeping() -> Self {
        Self {
            ignored: BTreeSet::from([
                EventField::CreatedBy,
                EventField::FolderId,
                EventField::Id,
                EventField::CalendarUser,
                EventField::Created,
                EventField::ModifiedBy,
                EventField::ExtendedProperties,
                EventField::Timestamp,
            ]),
            compare_alarms: true,
        }
    }

    /// Policy used between the cache and the external source: bookkeeping
    /// fields plus the fields the cache derives itself
    #[must_use]
    pub fn reconciliation() -> Self {
        let mut policy = Self::bookkeeping();
        policy.ignored.extend([
            EventField::SeriesId,
            EventField::ChangeExceptionDates,
            EventField::LastModified,
        ]);
        policy
    }

    /// Skip alarm comparison (for accounts whose alarms are not cached)
    #[must_use]
    pub const fn with_alarms(mut self, compare_alarms: bool) -> Self {
        self.compare_alarms = compare_alarms;
        self
    }

    pub fn ignores(&self, field: EventField) -> bool {
        self.ignored.contains(&field)
    }
}

impl Default for DiffPolicy {
    fn default() -> Self {
        Self::reconciliation()
    }
}

/// Matching key of an event: (uid, recurrence id)
///
/// Events without uid fall back to a fingerprint of start and summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EventKey {
    identity: String,
    recurrence_id: Option<RecurrenceId>,
}

impl EventKey {
    fn of(event: &Event) -> Self {
        let identity = event.resolvable_uid().map_or_else(
            || {
                format!(
                    "~{}|{}",
                    event.start().timestamp(),
                    event.summary().unwrap_or_default()
                )
            },
            str::to_string,
        );
        Self {
            identity,
            recurrence_id: event.recurrence_id(),
        }
    }
}

/// Computes [`EventUpdates`] under a [`DiffPolicy`]
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    policy: DiffPolicy,
}

impl DiffEngine {
    #[must_use]
    pub const fn new(policy: DiffPolicy) -> Self {
        Self { policy }
    }

    pub const fn policy(&self) -> &DiffPolicy {
        &self.policy
    }

    /// Diff the cached `originals` against the fetched `updates`
    pub fn diff(&self, originals: &[Event], updates: &[Event]) -> EventUpdates {
        let original_index = index_by_key(originals);
        let mut matched = HashSet::new();
        let mut result = EventUpdates::default();

        for (key, update) in keyed_unique(updates) {
            let Some(&position) = original_index.get(&key) else {
                result.added.push(update.clone());
                continue;
            };
            matched.insert(position);
            match self.compare(&originals[position], update) {
                Some(event_update) => result.updated.push(event_update),
                None => result.unchanged.push(originals[position].clone()),
            }
        }

        for (key, original) in keyed_unique(originals) {
            if original_index
                .get(&key)
                .is_some_and(|position| !matched.contains(position))
            {
                result.removed.push(original.clone());
            }
        }

        result
    }

    fn compare(&self, original: &Event, update: &Event) -> Option<EventUpdate> {
        let updated_fields: BTreeSet<_> = original
            .differing_fields(update)
            .into_iter()
            .filter(|field| !self.policy.ignores(*field))
            .collect();
        let attendee_updates =
            diff_collection(original.attendees(), update.attendees(), Attendee::identity, |a, b| a == b);
        let alarm_updates = if self.policy.compare_alarms {
            diff_collection(
                original.alarms(),
                update.alarms(),
                |alarm| alarm.uid.clone(),
                Alarm::same_content,
            )
        } else {
            CollectionUpdate::default()
        };

        if updated_fields.is_empty() && attendee_updates.is_empty() && alarm_updates.is_empty() {
            return None;
        }
        Some(EventUpdate {
            original: original.clone(),
            update: update.clone(),
            updated_fields,
            attendee_updates,
            alarm_updates,
        })
    }
}

/// Position of the first event per key
fn index_by_key(events: &[Event]) -> HashMap<EventKey, usize> {
    let mut index = HashMap::with_capacity(events.len());
    for (position, event) in events.iter().enumerate() {
        index.entry(EventKey::of(event)).or_insert(position);
    }
    index
}

/// Events paired with their key, later duplicates of a key skipped
fn keyed_unique(events: &[Event]) -> Vec<(EventKey, &Event)> {
    let mut seen = HashSet::with_capacity(events.len());
    let mut keyed = Vec::with_capacity(events.len());
    for event in events {
        let key = EventKey::of(event);
        if seen.insert(key.clone()) {
            keyed.push((key, event));
        } else {
            warn!(event = %event.display_key(), "Skipping duplicate event in diff input");
        }
    }
    keyed
}

fn diff_collection<T: Clone>(
    originals: &[T],
    updates: &[T],
    identity: impl Fn(&T) -> String,
    same: impl Fn(&T, &T) -> bool,
) -> CollectionUpdate<T> {
    let original_by_id: HashMap<String, &T> =
        originals.iter().map(|item| (identity(item), item)).collect();
    let update_ids: HashSet<String> = updates.iter().map(&identity).collect();
    let mut result = CollectionUpdate::default();

    for update in updates {
        match original_by_id.get(&identity(update)) {
            None => result.added.push(update.clone()),
            Some(original) if !same(original, update) => result.updated.push(ItemUpdate {
                original: (*original).clone(),
                update: update.clone(),
            }),
            Some(_) => {},
        }
    }
    for original in originals {
        if !update_ids.contains(&identity(original)) {
            result.removed.push(original.clone());
        }
    }
    result
}
