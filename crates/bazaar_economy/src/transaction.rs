//! # Transaction Definitions
//!
//! A transaction is a named list of costs and rewards. Each line names an item
//! id and a count, plus an optional expiry for what it grants.
//!
//! Lines and whole lists can be swapped at runtime through providers, so live
//! events can reprice an offer without editing the catalog.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How a reward line's expiry is computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationMode {
    /// Granted items never expire.
    #[default]
    NoExpiration,
    /// Granted items expire at a fixed date.
    AtDate,
    /// Granted items expire a fixed time after being granted.
    AfterDuration,
}

/// Runtime overrides for a single [`TransactionItem`].
///
/// Every method defaults to `None`, meaning "use the static value".
pub trait OverrideProvider: fmt::Debug + Send + Sync {
    /// Replacement count.
    fn count(&self) -> Option<u32> {
        None
    }

    /// Replacement expiration mode.
    fn expiration_mode(&self) -> Option<ExpirationMode> {
        None
    }

    /// Replacement expiry date.
    fn expiry_date(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Replacement expiry duration.
    fn expiry_duration(&self) -> Option<Duration> {
        None
    }
}

/// Runtime source for a transaction's cost or reward list.
pub trait TransactionItemListProvider: fmt::Debug + Send + Sync {
    /// The current list. An empty list falls back to the static one.
    fn items(&self) -> Vec<TransactionItem>;
}

/// One cost or reward line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionItem {
    /// Item id exchanged by this line.
    pub item_id: String,
    /// Static count.
    pub count: u32,
    /// Static expiration mode.
    #[serde(default)]
    pub expiration_mode: ExpirationMode,
    /// Static expiry date, used with [`ExpirationMode::AtDate`].
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    /// Static expiry duration in seconds, used with [`ExpirationMode::AfterDuration`].
    #[serde(default)]
    pub expiry_duration_secs: Option<u64>,
    #[serde(skip)]
    override_provider: Option<Arc<dyn OverrideProvider>>,
}

impl TransactionItem {
    /// A line whose items never expire.
    #[must_use]
    pub fn new(item_id: impl Into<String>, count: u32) -> Self {
        Self {
            item_id: item_id.into(),
            count,
            expiration_mode: ExpirationMode::NoExpiration,
            expiry_date: None,
            expiry_duration_secs: None,
            override_provider: None,
        }
    }

    /// A line whose items expire at `date`.
    #[must_use]
    pub fn expiring_at(item_id: impl Into<String>, count: u32, date: DateTime<Utc>) -> Self {
        Self {
            expiration_mode: ExpirationMode::AtDate,
            expiry_date: Some(date),
            ..Self::new(item_id, count)
        }
    }

    /// A line whose items expire `secs` seconds after being granted.
    #[must_use]
    pub fn expiring_after(item_id: impl Into<String>, count: u32, secs: u64) -> Self {
        Self {
            expiration_mode: ExpirationMode::AfterDuration,
            expiry_duration_secs: Some(secs),
            ..Self::new(item_id, count)
        }
    }

    /// Attaches a runtime override.
    #[must_use]
    pub fn with_override(mut self, provider: Arc<dyn OverrideProvider>) -> Self {
        self.override_provider = Some(provider);
        self
    }

    /// Effective count.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.override_provider
            .as_ref()
            .and_then(|p| p.count())
            .unwrap_or(self.count)
    }

    /// Effective expiration mode.
    #[must_use]
    pub fn expiry_mode(&self) -> ExpirationMode {
        self.override_provider
            .as_ref()
            .and_then(|p| p.expiration_mode())
            .unwrap_or(self.expiration_mode)
    }

    /// Effective expiry date. `None` unless the effective mode is `AtDate`.
    #[must_use]
    pub fn expiry_date(&self) -> Option<DateTime<Utc>> {
        if self.expiry_mode() != ExpirationMode::AtDate {
            return None;
        }
        self.override_provider
            .as_ref()
            .and_then(|p| p.expiry_date())
            .or(self.expiry_date)
    }

    /// Effective expiry duration. `None` unless the effective mode is `AfterDuration`.
    #[must_use]
    pub fn expiry_duration(&self) -> Option<Duration> {
        if self.expiry_mode() != ExpirationMode::AfterDuration {
            return None;
        }
        self.override_provider
            .as_ref()
            .and_then(|p| p.expiry_duration())
            .or_else(|| {
                self.expiry_duration_secs
                    .and_then(|secs| i64::try_from(secs).ok())
                    .map(Duration::seconds)
            })
    }

    /// Absolute expiry for items granted at `now`.
    #[must_use]
    pub fn resolve_expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.expiry_mode() {
            ExpirationMode::NoExpiration => None,
            ExpirationMode::AtDate => self.expiry_date(),
            ExpirationMode::AfterDuration => self
                .expiry_duration()
                .and_then(|duration| now.checked_add_signed(duration)),
        }
    }
}

/// A named exchange of costs for rewards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction id.
    pub transaction_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    costs: Vec<TransactionItem>,
    #[serde(default)]
    rewards: Vec<TransactionItem>,
    #[serde(skip)]
    costs_provider: Option<Arc<dyn TransactionItemListProvider>>,
    #[serde(skip)]
    rewards_provider: Option<Arc<dyn TransactionItemListProvider>>,
}

impl Transaction {
    /// Creates a transaction with no lines.
    #[must_use]
    pub fn new(transaction_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            name: name.into(),
            costs: Vec::new(),
            rewards: Vec::new(),
            costs_provider: None,
            rewards_provider: None,
        }
    }

    /// Appends a cost line.
    #[must_use]
    pub fn with_cost(mut self, item: TransactionItem) -> Self {
        self.costs.push(item);
        self
    }

    /// Appends a reward line.
    #[must_use]
    pub fn with_reward(mut self, item: TransactionItem) -> Self {
        self.rewards.push(item);
        self
    }

    /// Attaches a runtime cost list.
    #[must_use]
    pub fn with_costs_provider(mut self, provider: Arc<dyn TransactionItemListProvider>) -> Self {
        self.costs_provider = Some(provider);
        self
    }

    /// Attaches a runtime reward list.
    #[must_use]
    pub fn with_rewards_provider(
        mut self,
        provider: Arc<dyn TransactionItemListProvider>,
    ) -> Self {
        self.rewards_provider = Some(provider);
        self
    }

    /// Effective cost lines.
    #[must_use]
    pub fn costs(&self) -> Cow<'_, [TransactionItem]> {
        Self::resolve(&self.costs, self.costs_provider.as_deref())
    }

    /// Effective reward lines.
    #[must_use]
    pub fn rewards(&self) -> Cow<'_, [TransactionItem]> {
        Self::resolve(&self.rewards, self.rewards_provider.as_deref())
    }

    fn resolve<'a>(
        fixed: &'a [TransactionItem],
        provider: Option<&dyn TransactionItemListProvider>,
    ) -> Cow<'a, [TransactionItem]> {
        match provider.map(|p| p.items()) {
            Some(items) if !items.is_empty() => Cow::Owned(items),
            _ => Cow::Borrowed(fixed),
        }
    }
}
