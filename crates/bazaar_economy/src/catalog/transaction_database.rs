//! The transaction catalog.

use std::sync::Arc;

use bazaar_core::KeyedMap;
use once_cell::unsync::OnceCell;
use tracing::{info, warn};

use super::item_database::ItemDatabase;
use crate::error::{EconomyError, EconomyResult};
use crate::transaction::Transaction;

/// Every transaction the game offers, keyed by transaction id.
#[derive(Debug, Default)]
pub struct TransactionDatabase {
    transactions: Vec<Arc<Transaction>>,
    mapping: OnceCell<KeyedMap<String, Arc<Transaction>>>,
}

impl TransactionDatabase {
    /// Wraps transactions without validating them. The map is built lazily.
    fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: transactions.into_iter().map(Arc::new).collect(),
            mapping: OnceCell::new(),
        }
    }

    /// Builds a catalog, failing on empty or duplicate ids.
    ///
    /// # Errors
    ///
    /// Returns `Catalog` if ids are empty or duplicated.
    pub fn load(transactions: Vec<Transaction>) -> EconomyResult<Self> {
        let db = Self::new(transactions);
        db.transaction_mapping()?;
        info!("Transaction catalog loaded: {} transactions", db.len());
        Ok(db)
    }

    /// The id map, building it if needed.
    ///
    /// # Errors
    ///
    /// Returns the build error if ids are empty or duplicated.
    pub fn transaction_mapping(&self) -> EconomyResult<&KeyedMap<String, Arc<Transaction>>> {
        self.mapping.get_or_try_init(|| {
            let map = KeyedMap::build(self.transactions.iter().cloned(), |tx| {
                (!tx.transaction_id.is_empty()).then(|| tx.transaction_id.clone())
            })?;
            Ok::<_, EconomyError>(map)
        })
    }

    /// First transaction with the given id, scanning in declaration order.
    #[must_use]
    pub fn get_transaction_by_id(&self, transaction_id: &str) -> Option<&Arc<Transaction>> {
        self.find_one(|tx| tx.transaction_id == transaction_id)
    }

    /// First transaction matching `predicate`.
    pub fn find_one<P>(&self, mut predicate: P) -> Option<&Arc<Transaction>>
    where
        P: FnMut(&Transaction) -> bool,
    {
        self.transactions.iter().find(|tx| predicate(tx))
    }

    /// Every transaction matching `predicate`, in declaration order.
    pub fn find_many<'a, P>(&'a self, mut predicate: P) -> impl Iterator<Item = &'a Arc<Transaction>>
    where
        P: FnMut(&Transaction) -> bool + 'a,
    {
        self.transactions.iter().filter(move |tx| predicate(tx))
    }

    /// Returns true if this exact definition is the one registered under its id.
    #[must_use]
    pub fn check_registered(&self, transaction: &Arc<Transaction>) -> bool {
        self.transaction_mapping()
            .ok()
            .and_then(|map| map.get(transaction.transaction_id.as_str()))
            .is_some_and(|registered| Arc::ptr_eq(registered, transaction))
    }

    /// Returns true if some transaction is registered under `transaction_id`.
    #[must_use]
    pub fn check_registered_id(&self, transaction_id: &str) -> bool {
        self.transaction_mapping()
            .is_ok_and(|map| map.contains_key(transaction_id))
    }

    /// Looks up a transaction that must exist.
    ///
    /// # Errors
    ///
    /// Returns `Catalog(KeyNotFound)` for unknown ids.
    pub fn require(&self, transaction_id: &str) -> EconomyResult<&Arc<Transaction>> {
        Ok(self.transaction_mapping()?.require(transaction_id)?)
    }

    /// Replaces the transaction set and rebuilds the map.
    ///
    /// On failure the previous transactions stay in place. Processors share
    /// the catalog through an `Rc`; build a new
    /// [`TransactionManager`](crate::TransactionManager) to pick up the change.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn reload(&mut self, transactions: Vec<Transaction>) -> EconomyResult<()> {
        *self = Self::load(transactions)?;
        Ok(())
    }

    /// Checks every line references a known item.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDefinition` naming the first transaction with an unknown item.
    pub fn validate_against(&self, items: &ItemDatabase) -> EconomyResult<()> {
        for tx in &self.transactions {
            let costs = tx.costs();
            let rewards = tx.rewards();
            for line in costs.iter().chain(rewards.iter()) {
                if items.get(&line.item_id).is_none() {
                    warn!(
                        "Transaction '{}' references unknown item '{}'",
                        tx.transaction_id, line.item_id
                    );
                    return Err(EconomyError::InvalidDefinition {
                        item_id: tx.transaction_id.clone(),
                        reason: format!("unknown item '{}'", line.item_id),
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of transactions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Returns true if there are no transactions.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Transactions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Transaction>> {
        self.transactions.iter()
    }
}
