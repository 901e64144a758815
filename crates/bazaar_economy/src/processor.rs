//! # Transaction Processor
//!
//! Exchanges item stacks according to transaction definitions.
//!
//! ## Batch Contract
//!
//! A batch is all-or-nothing. Each transaction's costs reserve against a
//! running per-item balance taken from the live inventory, so two purchases
//! can't both spend the same gems. If any transaction can't be covered,
//! nothing is paid, nothing is granted and no save is requested. The
//! `Completed` event fires either way.
//!
//! Provider-driven lines are resolved once per batch. The same counts and
//! expiries are used to reserve and to apply, so a provider that changes its
//! answer between calls can't make a batch pay less than it reserved.
//!
//! Only spendable stacks pay: stacks queued for removal or already expired
//! count for nothing, even before the sweep detaches them.
//!
//! ## Ordering
//!
//! - Costs drain the smallest stacks of the cost item first.
//! - Rewards top up the largest stacks first, then open new ones.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::catalog::TransactionDatabase;
use crate::error::EconomyResult;
use crate::inventory::{Inventory, StackOrder};
use crate::transaction::Transaction;

/// Owner of an inventory that transactions run against.
pub trait InventoryHost {
    /// The inventory.
    fn inventory(&self) -> &Inventory;

    /// The inventory, mutably.
    fn inventory_mut(&mut self) -> &mut Inventory;

    /// Asks the host to persist the inventory soon.
    fn request_save(&mut self);
}

/// Outcome of [`TransactionManager::perform_transactions`].
#[derive(Clone, Debug, Default)]
pub struct TransactionResult {
    /// True if every transaction was applied.
    pub success: bool,
    /// Why the batch was rejected.
    pub error_message: Option<String>,
    /// Every transaction in the batch, in order.
    pub transactions: Vec<Arc<Transaction>>,
    /// Transactions whose costs could not be covered.
    pub failed_transactions: Vec<Arc<Transaction>>,
}

/// Notifications buffered by a [`TransactionManager`].
#[derive(Clone, Debug)]
pub enum TransactionEvent {
    /// A batch finished, successfully or not.
    Completed(TransactionResult),
}

/// One resolved cost or reward line.
#[derive(Debug)]
struct BatchLine {
    item_id: String,
    count: u32,
    expires_at: Option<DateTime<Utc>>,
}

/// A transaction with its lines frozen for the duration of a batch.
#[derive(Debug)]
struct ResolvedTransaction<'a> {
    transaction: &'a Arc<Transaction>,
    costs: Vec<BatchLine>,
    rewards: Vec<BatchLine>,
}

impl<'a> ResolvedTransaction<'a> {
    fn resolve(transaction: &'a Arc<Transaction>, now: DateTime<Utc>) -> Self {
        let costs = transaction
            .costs()
            .iter()
            .map(|cost| BatchLine {
                item_id: cost.item_id.clone(),
                count: cost.count(),
                expires_at: None,
            })
            .collect();
        let rewards = transaction
            .rewards()
            .iter()
            .map(|reward| BatchLine {
                item_id: reward.item_id.clone(),
                count: reward.count(),
                expires_at: reward.resolve_expiry(now),
            })
            .collect();

        Self {
            transaction,
            costs,
            rewards,
        }
    }
}

/// Checks and performs transactions against an inventory.
#[derive(Debug)]
pub struct TransactionManager {
    database: Rc<TransactionDatabase>,
    events: Vec<TransactionEvent>,
}

impl TransactionManager {
    /// Creates a processor for `database`.
    #[must_use]
    pub fn new(database: Rc<TransactionDatabase>) -> Self {
        Self {
            database,
            events: Vec::new(),
        }
    }

    /// The transaction catalog.
    #[must_use]
    pub fn database(&self) -> &Rc<TransactionDatabase> {
        &self.database
    }

    /// Returns true if the inventory's family totals cover every cost line.
    ///
    /// Each cost is compared against the stacked count of the cost item's
    /// whole family, not just the item itself.
    #[must_use]
    pub fn check_performable(inventory: &Inventory, transaction: &Transaction) -> bool {
        transaction
            .costs()
            .iter()
            .all(|cost| Self::family_covers(inventory, &cost.item_id, u64::from(cost.count())))
    }

    /// Like [`check_performable`](Self::check_performable) with costs summed
    /// per item across the whole batch.
    #[must_use]
    pub fn check_all_performable(inventory: &Inventory, transactions: &[Arc<Transaction>]) -> bool {
        let mut totals: HashMap<String, u64> = HashMap::new();
        for transaction in transactions {
            for cost in transaction.costs().iter() {
                *totals.entry(cost.item_id.clone()).or_default() += u64::from(cost.count());
            }
        }
        totals
            .iter()
            .all(|(item_id, &required)| Self::family_covers(inventory, item_id, required))
    }

    fn family_covers(inventory: &Inventory, item_id: &str, required: u64) -> bool {
        if required == 0 {
            return true;
        }
        inventory
            .catalog()
            .get(item_id)
            .is_some_and(|data| required <= inventory.count_stack_by_type(data.item_type()))
    }

    /// Runs a batch against the host's inventory.
    ///
    /// See the module docs for the all-or-nothing contract.
    pub fn perform_transactions<H>(
        &mut self,
        host: &mut H,
        transactions: &[Arc<Transaction>],
    ) -> TransactionResult
    where
        H: InventoryHost + ?Sized,
    {
        let now = host.inventory().now();
        let batch: Vec<ResolvedTransaction<'_>> = transactions
            .iter()
            .map(|transaction| ResolvedTransaction::resolve(transaction, now))
            .collect();
        let failed = Self::reserve(host.inventory(), &batch, now);

        let result = if failed.is_empty() {
            let inventory = host.inventory_mut();
            for resolved in &batch {
                Self::apply(inventory, resolved, now);
            }
            host.request_save();
            info!("Performed {} transactions", transactions.len());

            TransactionResult {
                success: true,
                error_message: None,
                transactions: transactions.to_vec(),
                failed_transactions: Vec::new(),
            }
        } else {
            let ids: Vec<&str> = failed
                .iter()
                .map(|tx| tx.transaction_id.as_str())
                .collect();
            let message = format!("insufficient items for: {}", ids.join(", "));
            warn!("Transaction batch rejected, {}", message);

            TransactionResult {
                success: false,
                error_message: Some(message),
                transactions: transactions.to_vec(),
                failed_transactions: failed,
            }
        };

        self.events
            .push(TransactionEvent::Completed(result.clone()));
        result
    }

    /// Resolves ids against the catalog, then runs them as one batch.
    ///
    /// # Errors
    ///
    /// Returns `Catalog(KeyNotFound)` if any id is unknown. Nothing runs in that case.
    pub fn perform_by_ids<H>(&mut self, host: &mut H, ids: &[&str]) -> EconomyResult<TransactionResult>
    where
        H: InventoryHost + ?Sized,
    {
        let transactions = ids
            .iter()
            .map(|id| self.database.require(id).map(Arc::clone))
            .collect::<EconomyResult<Vec<_>>>()?;
        Ok(self.perform_transactions(host, &transactions))
    }

    /// Takes every buffered event.
    pub fn drain_events(&mut self) -> Vec<TransactionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Walks the batch in order, returning the transactions that don't fit.
    fn reserve(
        inventory: &Inventory,
        batch: &[ResolvedTransaction<'_>],
        now: DateTime<Utc>,
    ) -> Vec<Arc<Transaction>> {
        let mut balance: HashMap<&str, u64> = HashMap::new();
        let mut failed = Vec::new();

        for resolved in batch {
            let mut needed: HashMap<&str, u64> = HashMap::new();
            for cost in &resolved.costs {
                if cost.count > 0 {
                    *needed.entry(cost.item_id.as_str()).or_default() += u64::from(cost.count);
                }
            }

            let fits = needed.iter().all(|(&item_id, &count)| {
                let available = *balance.entry(item_id).or_insert_with(|| {
                    inventory
                        .spendable_stack_by_item_id(item_id, now)
                        .unwrap_or(0)
                });
                count <= available
            });

            if fits {
                for (item_id, count) in needed {
                    if let Some(available) = balance.get_mut(item_id) {
                        *available -= count;
                    }
                }
            } else {
                failed.push(Arc::clone(resolved.transaction));
            }
        }
        failed
    }

    fn apply(inventory: &mut Inventory, resolved: &ResolvedTransaction<'_>, now: DateTime<Utc>) {
        let transaction_id = &resolved.transaction.transaction_id;

        for cost in &resolved.costs {
            let unpaid = inventory.pay(&cost.item_id, cost.count, now);
            if unpaid > 0 {
                error!(
                    "Transaction '{}' left {} x '{}' unpaid after reservation",
                    transaction_id, unpaid, cost.item_id
                );
            }
        }

        for reward in &resolved.rewards {
            if let Err(e) = inventory.add_with_order(
                &reward.item_id,
                reward.count,
                reward.expires_at,
                StackOrder::LargestFirst,
            ) {
                warn!(
                    "Transaction '{}' could not grant '{}': {}",
                    transaction_id, reward.item_id, e
                );
            }
        }
    }
}
