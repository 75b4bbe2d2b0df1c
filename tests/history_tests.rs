//! On-disk history behavior.

mod fixtures;

use greenbin_dispatch::history::{
    BinAction, BinLevelChange, DispatchAction, DispatchSnapshot, HistoryAction, HistoryCategory,
    HistoryManager,
};
use greenbin_dispatch::model::BinId;
use greenbin_dispatch::store::JsonStore;

use fixtures::{bin, vehicle, TempDir};

fn level_change(id: u32, old_level: f64, new_level: f64) -> BinAction {
    BinAction::UpdateBin(BinLevelChange {
        id: BinId(id),
        old_level,
        new_level,
    })
}

#[test]
fn test_reload_preserves_stack_order() {
    let dir = TempDir::new("history-reload");
    let path = dir.join("history.json");

    let mut history = HistoryManager::open(JsonStore::file(&path));
    history.push(BinAction::AddBin(bin(1, 25.0, 55.0, 10.0, "general"))).unwrap();
    history.push(level_change(1, 10.0, 40.0)).unwrap();
    history.push(level_change(1, 40.0, 75.0)).unwrap();
    let stamps: Vec<_> = history
        .entries(HistoryCategory::Bin)
        .iter()
        .map(|e| e.timestamp)
        .collect();
    drop(history);

    let mut reopened = HistoryManager::open(JsonStore::file(&path));
    assert_eq!(reopened.len(HistoryCategory::Bin), 3);
    let reloaded: Vec<_> = reopened
        .entries(HistoryCategory::Bin)
        .iter()
        .map(|e| e.timestamp)
        .collect();
    assert_eq!(reloaded, stamps);

    let top = reopened.pop(HistoryCategory::Bin).unwrap().unwrap();
    assert_eq!(top.action, HistoryAction::Bin(level_change(1, 40.0, 75.0)));
    let next = reopened.pop(HistoryCategory::Bin).unwrap().unwrap();
    assert_eq!(next.action, HistoryAction::Bin(level_change(1, 10.0, 40.0)));
}

#[test]
fn test_pop_is_persisted() {
    let dir = TempDir::new("history-pop");
    let path = dir.join("history.json");

    let mut history = HistoryManager::open(JsonStore::file(&path));
    history.push(level_change(2, 0.0, 20.0)).unwrap();
    history.push(level_change(2, 20.0, 30.0)).unwrap();
    history.pop(HistoryCategory::Bin).unwrap();

    let reopened = HistoryManager::open(JsonStore::file(&path));
    assert_eq!(reopened.len(HistoryCategory::Bin), 1);
    assert_eq!(
        reopened.peek(HistoryCategory::Bin).unwrap().action,
        HistoryAction::Bin(level_change(2, 0.0, 20.0))
    );
}

#[test]
fn test_stored_document_shape() {
    let dir = TempDir::new("history-shape");
    let mut history = HistoryManager::open(JsonStore::file(dir.join("history.json")));
    history.push(level_change(3, 50.0, 0.0)).unwrap();
    history
        .push(DispatchAction::DispatchAll(DispatchSnapshot {
            vehicles: vec![vehicle(1, 25.01, 55.01)],
            bins: vec![bin(3, 25.02, 55.02, 50.0, "general")],
        }))
        .unwrap();

    let doc = dir.read_json("history.json");
    let object = doc.as_object().unwrap();
    for category in ["request", "bin", "dispatch"] {
        assert!(object[category].is_array(), "missing category {}", category);
    }
    assert_eq!(object["request"].as_array().unwrap().len(), 0);

    let update = &doc["bin"][0];
    assert_eq!(update["type"], "update_bin");
    assert_eq!(update["data"]["id"], 3);
    assert_eq!(update["data"]["old_level"], 50.0);
    assert!(update["timestamp"].is_string());

    let dispatch = &doc["dispatch"][0];
    assert_eq!(dispatch["type"], "dispatch_all");
    assert_eq!(dispatch["data"]["vehicles"][0]["id"], 1);
    assert_eq!(dispatch["data"]["bins"][0]["fill_level"], 50.0);
    // Vehicle targets are stored as ids.
    assert!(dispatch["data"]["vehicles"][0]["target_bin"].is_null());
}

#[test]
fn test_missing_file_loads_empty() {
    let dir = TempDir::new("history-missing");
    let history = HistoryManager::open(JsonStore::file(dir.join("history.json")));
    for category in HistoryCategory::ALL {
        assert!(history.is_empty(category));
    }
}

#[test]
fn test_corrupt_file_loads_empty() {
    for (label, raw) in [
        ("blank", "   \n"),
        ("garbage", "{not json"),
        ("wrong-root", "[1, 2, 3]"),
        ("unknown-category", r#"{"vehicles": []}"#),
        (
            "wrong-category",
            r#"{"dispatch": [{"type": "update_bin", "data": {"id": 1, "old_level": 0, "new_level": 5}}]}"#,
        ),
        ("unknown-type", r#"{"bin": [{"type": "paint_bin", "data": {}}]}"#),
    ] {
        let dir = TempDir::new(label);
        dir.write_raw("history.json", raw);
        let history = HistoryManager::open(JsonStore::file(dir.join("history.json")));
        for category in HistoryCategory::ALL {
            assert!(history.is_empty(category), "{} left entries in {}", label, category);
        }
    }
}

#[test]
fn test_legacy_entries_without_timestamp_load() {
    let dir = TempDir::new("history-legacy");
    dir.write_raw(
        "history.json",
        r#"{
            "bin": [
                {"type": "update_bin", "data": {"id": 4, "old_level": 10.0, "new_level": 90.0}}
            ],
            "request": []
        }"#,
    );

    let before = chrono::Utc::now();
    let mut history = HistoryManager::open(JsonStore::file(dir.join("history.json")));
    assert_eq!(history.len(HistoryCategory::Bin), 1);
    assert!(history.is_empty(HistoryCategory::Dispatch));
    assert!(history.peek(HistoryCategory::Bin).unwrap().timestamp >= before);

    let (action, _) = history.pop_action::<BinAction>().unwrap().unwrap();
    assert_eq!(action, level_change(4, 10.0, 90.0));
}

#[test]
fn test_failed_save_rolls_back_push() {
    let dir = TempDir::new("history-readonly");
    // A directory where the file should be makes every save fail.
    std::fs::create_dir_all(dir.join("history.json")).unwrap();

    let mut history = HistoryManager::open(JsonStore::file(dir.join("history.json")));
    assert!(history.push(level_change(1, 0.0, 10.0)).is_err());
    assert!(history.is_empty(HistoryCategory::Bin));
}

#[test]
fn test_loads_history_with_embedded_vehicle_targets() {
    let dir = TempDir::new("history-embedded");
    dir.write_raw(
        "history.json",
        r#"{
            "request": [],
            "bin": [
                {"type": "update_bin", "data": {"id": 1, "old_level": 20, "new_level": 65}}
            ],
            "dispatch": [
                {
                    "type": "dispatch_all",
                    "data": {
                        "vehicles": [{
                            "id": 1, "x": 25.01, "y": 55.01, "capacity": 100, "load": 0,
                            "current_node": [25.01, 55.01], "available": true,
                            "target_bin": {"id": 1, "location": "Deira", "bin_type": "general",
                                           "capacity": 100, "fill_level": 0, "x": 25.02, "y": 55.02},
                            "target_facility": null,
                            "current_route": [[55.01, 25.01], [55.02, 25.02]],
                            "dist_to_bin": 1500.0, "dist_to_facility": 0, "dist_return": 0,
                            "total_distance": 1500.0
                        }],
                        "bins": [{"id": 1, "location": "Deira", "bin_type": "general",
                                  "capacity": 100, "fill_level": 65, "x": 25.02, "y": 55.02}]
                    },
                    "timestamp": "2025-03-01T09:30:00.123456"
                }
            ]
        }"#,
    );

    let mut history = HistoryManager::open(JsonStore::file(dir.join("history.json")));
    assert_eq!(history.len(HistoryCategory::Bin), 1);
    assert_eq!(history.len(HistoryCategory::Dispatch), 1);
    assert_eq!(
        history.peek(HistoryCategory::Dispatch).unwrap().timestamp.to_rfc3339(),
        "2025-03-01T09:30:00.123456+00:00"
    );

    let (action, _) = history.pop_action::<DispatchAction>().unwrap().unwrap();
    let DispatchAction::DispatchAll(snapshot) = action;
    assert_eq!(snapshot.vehicles[0].target_bin, Some(BinId(1)));
    assert_eq!(snapshot.vehicles[0].total_distance, 1500.0);
    assert_eq!(snapshot.bins[0].fill_level, 65.0);

    let (bin_action, _) = history.pop_action::<BinAction>().unwrap().unwrap();
    assert_eq!(bin_action, level_change(1, 20.0, 65.0));
}
