//! End-to-end scenarios for the economy crate.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use bazaar_core::{load, save, FileStore, ManualClock, MemoryStore, SaveStore};
use bazaar_economy::{
    CatalogManifest, EconomyConfig, Inventory, InventoryEvent, InventoryHost, InventoryManager,
    InventorySave, ItemDatabase, TransactionManager,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

const CATALOG: &str = r#"
[[items]]
item_id = "gem"
name = "Gem"
max_stack = 99
item_type = "currency"

[[items]]
item_id = "coin"
name = "Coin"
max_stack = 999
item_type = "currency"

[[items]]
item_id = "booster"
name = "Booster"
max_stack = 5
item_type = "booster"

[[transactions]]
transaction_id = "buy_booster"
name = "Buy Booster"
costs = [{ item_id = "gem", count = 20 }]
rewards = [{ item_id = "booster", count = 1, expiration_mode = "after_duration", expiry_duration_secs = 3600 }]

[[transactions]]
transaction_id = "daily_gift"
name = "Daily Gift"
rewards = [{ item_id = "coin", count = 100 }]
"#;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap()
}

fn catalogs() -> (Rc<ItemDatabase>, TransactionManager) {
    let catalog = CatalogManifest::from_toml_str(CATALOG)
        .unwrap()
        .build()
        .unwrap();
    (
        Rc::new(catalog.items),
        TransactionManager::new(Rc::new(catalog.transactions)),
    )
}

fn stacks(inventory: &Inventory, item_id: &str) -> Vec<u32> {
    inventory
        .find_many_by_item_id(item_id)
        .unwrap()
        .into_iter()
        .map(|h| inventory.item(h).unwrap().count())
        .collect()
}

#[test]
fn test_gem_stacks_split_and_sweep() {
    let (items, _) = catalogs();
    let clock = Arc::new(ManualClock::new(start()));
    let mut inventory = Inventory::new(items, clock);

    let created = inventory.add_item("gem", 150, None).unwrap();
    assert_eq!(stacks(&inventory, "gem"), vec![99, 51]);

    inventory.remove_item(created[0]).unwrap();
    assert!(inventory.update_inventory());

    assert_eq!(stacks(&inventory, "gem"), vec![51]);
    inventory.verify_indices().unwrap();
}

#[test]
fn test_expired_stack_leaves_every_index() {
    let (items, _) = catalogs();
    let clock = Arc::new(ManualClock::new(start()));
    let mut inventory = Inventory::new(items, clock.clone());

    inventory
        .add_item("gem", 10, Some(start() - Duration::seconds(1)))
        .unwrap();
    inventory.add_item("coin", 10, None).unwrap();

    assert!(inventory.update_inventory());
    assert_eq!(inventory.count_by_item_id("gem").unwrap(), 0);
    assert_eq!(inventory.count_stack_by_type(&"currency".into()), 10);
    inventory.verify_indices().unwrap();
}

#[test]
fn test_events_describe_changes() {
    let (items, _) = catalogs();
    let clock = Arc::new(ManualClock::new(start()));
    let mut inventory = Inventory::new(items, clock);

    let first = inventory.add_item("gem", 90, None).unwrap()[0];
    let second = inventory.add_item("gem", 20, None).unwrap()[0];

    assert_eq!(
        inventory.drain_events(),
        vec![
            InventoryEvent::ItemAdded(first),
            InventoryEvent::CountChanged {
                handle: first,
                previous: 90,
                current: 99
            },
            InventoryEvent::ItemAdded(second),
        ]
    );
}

#[test]
fn test_shop_flow_through_manager() {
    let (items, mut shop) = catalogs();
    let clock = Arc::new(ManualClock::new(start()));
    let mut manager = InventoryManager::open(
        MemoryStore::new(),
        EconomyConfig::default(),
        items,
        clock.clone(),
    )
    .unwrap();

    manager.inventory_mut().add_item("gem", 45, None).unwrap();

    let result = shop
        .perform_by_ids(&mut manager, &["buy_booster", "buy_booster"])
        .unwrap();
    assert!(result.success);
    assert_eq!(manager.inventory().count_stack_by_item_id("gem").unwrap(), 5);
    assert_eq!(
        manager.inventory().count_stack_by_item_id("booster").unwrap(),
        2
    );
    assert!(manager.is_write_pending());

    // Broke now: one more booster is refused as a whole batch.
    let refused = shop
        .perform_by_ids(&mut manager, &["daily_gift", "buy_booster"])
        .unwrap();
    assert!(!refused.success);
    assert_eq!(refused.failed_transactions.len(), 1);
    assert_eq!(
        manager.inventory().count_stack_by_item_id("coin").unwrap(),
        0
    );

    assert!(manager.tick(StdDuration::from_millis(16)));

    clock.advance(Duration::hours(1) + Duration::seconds(1));
    manager.tick(StdDuration::from_millis(16));
    assert_eq!(
        InventoryHost::inventory(&manager)
            .count_stack_by_item_id("booster")
            .unwrap(),
        0
    );
}

#[test]
fn test_payment_drains_smallest_stacks_first() {
    let (items, mut shop) = catalogs();
    let clock = Arc::new(ManualClock::new(start()));
    let mut inventory = Inventory::new(items, clock);

    // Three stacks of 5, 2 and 8 with distinct expiries so they don't merge.
    for (amount, days) in [(5, 1), (2, 2), (8, 3)] {
        inventory
            .add_item("gem", amount, Some(start() + Duration::days(days)))
            .unwrap();
    }

    struct Host(Inventory, usize);

    impl InventoryHost for Host {
        fn inventory(&self) -> &Inventory {
            &self.0
        }

        fn inventory_mut(&mut self) -> &mut Inventory {
            &mut self.0
        }

        fn request_save(&mut self) {
            self.1 += 1;
        }
    }

    let mut host = Host(inventory, 0);
    let transaction = Arc::clone(shop.database().require("buy_booster").unwrap());
    let cheaper = Arc::new(
        bazaar_economy::Transaction::new("spend_10", "Spend 10")
            .with_cost(bazaar_economy::TransactionItem::new("gem", 10)),
    );

    let result = shop.perform_transactions(&mut host, &[cheaper]);
    assert!(result.success);
    assert_eq!(host.1, 1);

    host.0.update_inventory();
    assert_eq!(stacks(&host.0, "gem"), vec![5]);

    // 5 gems left and no coins in the currency family.
    assert!(!TransactionManager::check_performable(&host.0, &transaction));
}

#[test]
fn test_roundtrip_through_memory_store() {
    let (items, _) = catalogs();
    let clock = Arc::new(ManualClock::new(start()));
    let mut inventory = Inventory::new(Rc::clone(&items), clock.clone());
    inventory.add_item("gem", 150, None).unwrap();
    inventory
        .add_item_after("booster", 3, Duration::minutes(5))
        .unwrap();

    let store = MemoryStore::new();
    save(&store, "slot", &inventory.to_save()).unwrap();
    let restored = Inventory::from_save(load(&store, "slot").unwrap(), items, clock);

    let before: Vec<_> = inventory
        .items()
        .map(|(_, i)| (i.id(), i.count(), i.expires_at()))
        .collect();
    let after: Vec<_> = restored
        .items()
        .map(|(_, i)| (i.id(), i.count(), i.expires_at()))
        .collect();
    assert_eq!(before, after);
    restored.verify_indices().unwrap();
}

#[test]
fn test_roundtrip_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let (items, _) = catalogs();
    let clock = Arc::new(ManualClock::new(start()));
    let config = EconomyConfig {
        save_dir: dir.path().join("save_data"),
        ..EconomyConfig::default()
    };

    {
        let store = FileStore::new(&config.save_dir);
        let mut manager =
            InventoryManager::open(store, config.clone(), Rc::clone(&items), clock.clone())
                .unwrap();
        manager.inventory_mut().add_item("coin", 1200, None).unwrap();
        manager.request_save();
        manager.flush().unwrap();
    }

    let raw = std::fs::read_to_string(dir.path().join("save_data/ingame_inventory.json")).unwrap();
    assert!(raw.starts_with("Version: 1.0.0\n"));

    let manager =
        InventoryManager::open(FileStore::new(&config.save_dir), config, items, clock).unwrap();
    assert_eq!(
        stacks(manager.inventory(), "coin"),
        vec![999, 201]
    );
}

#[test]
fn test_legacy_save_opens() {
    let (items, _) = catalogs();
    let clock = Arc::new(ManualClock::new(start()));
    let store = MemoryStore::new();
    store
        .write(
            "ingame_inventory",
            r#"{ "items": [ { "itemId": "gem", "itemStack": 30, "InventoryTraits": {} } ] }"#,
        )
        .unwrap();

    let manager =
        InventoryManager::open(store, EconomyConfig::default(), items, clock).unwrap();
    assert_eq!(stacks(manager.inventory(), "gem"), vec![30]);

    let snapshot: InventorySave = load(manager.store(), "ingame_inventory").unwrap();
    assert_eq!(snapshot.items.len(), 1);
}

#[test]
fn test_corrupt_save_is_reported() {
    let (items, _) = catalogs();
    let clock = Arc::new(ManualClock::new(start()));
    let store = MemoryStore::new();
    store
        .write("ingame_inventory", "Version: 1.0.0\n{ broken")
        .unwrap();

    assert!(InventoryManager::open(store, EconomyConfig::default(), items, clock).is_err());
}
