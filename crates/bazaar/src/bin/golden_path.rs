//! # Golden Path
//!
//! Drives one player session through the whole economy:
//!
//! Catalog → Grant 150 Gems → Shop Batch → Refused Batch →
//! Remove + Sweep → Booster Expires → Debounced Save → Reload
//!
//! Every step is checked. Exits with 1 on the first mismatch.
//!
//! Set `RUST_LOG=debug` to see the engine's own logs.

use std::error::Error;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use bazaar_core::{FileStore, ManualClock};
use bazaar_economy::{
    CatalogManifest, EconomyConfig, Inventory, InventoryManager, TransactionEvent,
    TransactionManager,
};
use chrono::{Duration, Utc};
use tracing::info;
use tracing_subscriber::EnvFilter;

const CATALOG: &str = include_str!("../../data/catalog.toml");
const SETTINGS: &str = include_str!("../../data/economy.toml");

/// One frame at 60 Hz.
const FRAME: StdDuration = StdDuration::from_millis(16);

type StepResult = Result<(), Box<dyn Error>>;

fn ensure(condition: bool, step: &str) -> StepResult {
    if condition {
        println!("  ✓ {step}");
        Ok(())
    } else {
        Err(format!("step failed: {step}").into())
    }
}

fn stacks(inventory: &Inventory, item_id: &str) -> Result<Vec<u32>, Box<dyn Error>> {
    Ok(inventory
        .find_many_by_item_id(item_id)?
        .into_iter()
        .filter_map(|h| inventory.item(h).map(|i| i.count()))
        .collect())
}

fn run() -> StepResult {
    let scratch = tempfile::tempdir()?;
    let mut config = EconomyConfig::from_toml_str(SETTINGS)?;
    config.save_dir = scratch.path().join(&config.save_dir);

    let catalog = CatalogManifest::from_toml_str(CATALOG)?.build()?;
    let items = Rc::new(catalog.items);
    let mut shop = TransactionManager::new(Rc::new(catalog.transactions));
    info!(
        "Catalog: {} items, {} transactions",
        items.len(),
        shop.database().len()
    );

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let mut manager = InventoryManager::open(
        FileStore::new(&config.save_dir),
        config.clone(),
        Rc::clone(&items),
        clock.clone(),
    )?;

    // =========================================================================
    // STEP 1: Grant
    // =========================================================================
    println!("[1] Grant 150 gems");
    manager.inventory_mut().add_item("gem", 150, None)?;
    manager.request_save();
    ensure(
        stacks(manager.inventory(), "gem")? == [99, 51],
        "150 gems split into 99 + 51",
    )?;

    // =========================================================================
    // STEP 2: Shop batch
    // =========================================================================
    println!("[2] Buy a booster and claim the daily gift");
    let result = shop.perform_by_ids(&mut manager, &["buy_booster", "daily_gift"])?;
    ensure(result.success, "batch applied")?;
    ensure(
        stacks(manager.inventory(), "gem")? == [99, 31],
        "cost taken from the smaller stack",
    )?;
    ensure(
        manager.inventory().count_stack_by_item_id("coin")? == 100,
        "daily gift granted 100 coins",
    )?;
    ensure(
        manager.inventory().count_stack_by_item_id("booster")? == 1,
        "booster granted",
    )?;

    // =========================================================================
    // STEP 3: Refused batch
    // =========================================================================
    println!("[3] Try to buy a helmet with 100 coins");
    let refused = shop.perform_by_ids(&mut manager, &["daily_gift", "buy_helmet"])?;
    ensure(!refused.success, "batch refused")?;
    ensure(
        manager.inventory().count_stack_by_item_id("coin")? == 100,
        "gift inside the refused batch was not applied",
    )?;

    // =========================================================================
    // STEP 4: Remove and sweep
    // =========================================================================
    println!("[4] Remove the 31 gem stack");
    let handles = manager.inventory().find_many_by_item_id("gem")?;
    if let Some(&last) = handles.last() {
        manager.inventory_mut().remove_item(last)?;
    }
    ensure(
        manager.inventory().pending_removals() == 1,
        "stack queued for removal",
    )?;
    manager.tick(FRAME);
    ensure(
        stacks(manager.inventory(), "gem")? == [99],
        "sweep detached the stack",
    )?;

    // =========================================================================
    // STEP 5: Expiry
    // =========================================================================
    println!("[5] Skip ahead one hour");
    clock.advance(Duration::hours(1) + Duration::seconds(1));
    manager.tick(FRAME);
    ensure(
        manager.inventory().count_stack_by_item_id("booster")? == 0,
        "booster expired",
    )?;

    let events = manager.inventory_mut().drain_events();
    let completed = shop
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, TransactionEvent::Completed(r) if r.success))
        .count();
    info!(
        "{} inventory events, {} completed batches",
        events.len(),
        completed
    );

    // =========================================================================
    // STEP 6: Save and reload
    // =========================================================================
    println!("[6] Flush and reload from disk");
    manager.flush_if_pending()?;
    let restored = InventoryManager::open(
        FileStore::new(&config.save_dir),
        config,
        items,
        clock,
    )?;
    ensure(
        stacks(restored.inventory(), "gem")? == [99],
        "gems survived the reload",
    )?;
    ensure(
        restored.inventory().count_stack_by_item_id("coin")? == 100,
        "coins survived the reload",
    )?;
    restored.inventory().verify_indices()?;
    println!("  ✓ indices consistent");

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                  BAZAAR GOLDEN PATH                              ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    match run() {
        Ok(()) => {
            println!();
            println!("✅ GOLDEN PATH PASSED");
        }
        Err(e) => {
            println!();
            println!("❌ GOLDEN PATH FAILED: {e}");
            std::process::exit(1);
        }
    }
}
