//! Calendar session carrying the caller's identity and request parameters
//!
//! A `CalendarSession` is created once per request and passed to the caching
//! service. It provides:
//!
//! - `account_id`: the account whose folders are cached
//! - `user_id`: the acting user, stamped into created/modified/deleted fields
//! - `capabilities`: what the account's provider supports
//! - `range`: the date window the caller asked for
//! - `timestamp`: when the request was received, used for every stamp
//!
//! # Examples
//!
//! ```
//! use application::CalendarSession;
//! use domain::{AccountCapabilities, AccountId, UserId};
//!
//! let session = CalendarSession::new(AccountId::new(1), UserId::new(7))
//!     .with_capabilities(AccountCapabilities::with_alarms());
//! assert!(session.capabilities().supports_alarms);
//! assert!(session.range().is_none());
//! ```

use chrono::{DateTime, Utc};
use domain::{AccountCapabilities, AccountId, DateRange, UserId};

/// Context of one caching request
#[derive(Debug, Clone)]
pub struct CalendarSession {
    account_id: AccountId,
    user_id: UserId,
    capabilities: AccountCapabilities,
    range: Option<DateRange>,
    timestamp: DateTime<Utc>,
}

impl CalendarSession {
    /// Create a session without alarm support and without a date window
    #[must_use]
    pub fn new(account_id: AccountId, user_id: UserId) -> Self {
        Self {
            account_id,
            user_id,
            capabilities: AccountCapabilities::default(),
            range: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the account capabilities
    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: AccountCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Restrict the request to a date window
    #[must_use]
    pub const fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Pin the request timestamp
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub const fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    pub const fn capabilities(&self) -> AccountCapabilities {
        self.capabilities
    }

    pub const fn range(&self) -> Option<DateRange> {
        self.range
    }

    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
