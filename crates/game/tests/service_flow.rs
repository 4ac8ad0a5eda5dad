use std::sync::Arc;
use std::thread;

use clickrush_common::AppConfig;
use clickrush_game::{ClickOutcome, ConnectOutcome, GameService};
use tempfile::TempDir;

fn config_for(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config
}

fn connect(service: &GameService) -> (String, Option<String>) {
    match service.connect() {
        ConnectOutcome::Connected {
            client_id,
            session_id,
            ..
        } => (client_id, session_id),
        ConnectOutcome::CapacityExceeded => panic!("unexpected capacity rejection"),
    }
}

#[test]
fn counter_survives_a_restart() {
    let dir = TempDir::new().unwrap();

    {
        let service = GameService::open(config_for(&dir)).unwrap();
        let (client, session) = connect(&service);
        for _ in 0..5 {
            service.click(&client, session.as_deref());
        }
        service.unlock_achievement(&client, "five_clicks");
    }

    let service = GameService::open(config_for(&dir)).unwrap();
    assert_eq!(service.counter().count, 5);
    assert!(service
        .achievements()
        .unwrap()
        .global_unlocked
        .contains("five_clicks"));
    let stats = service.stats().unwrap();
    assert_eq!(stats.clicks_today, 5);
    assert_eq!(stats.unique_users, 1);
}

#[test]
fn rate_limit_scenario_from_five_per_minute() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);
    config.rate_limit.max_requests_per_minute = 5;
    let service = GameService::open(config).unwrap();
    let (client, _) = connect(&service);

    let accepted: Vec<bool> = (0..6)
        .map(|_| matches!(service.click(&client, None), ClickOutcome::Accepted { .. }))
        .collect();

    assert_eq!(accepted, vec![true, true, true, true, true, false]);
    assert_eq!(service.counter().count, 5);
}

#[test]
fn corrupt_counter_on_startup_is_quarantined() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("button_clicks.json"), b"\x00\x01garbage").unwrap();

    let service = GameService::open(config_for(&dir)).unwrap();
    assert_eq!(service.counter().count, 0);

    let quarantined = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("button_clicks.json.corrupted.")
        })
        .count();
    assert_eq!(quarantined, 1);

    let (client, _) = connect(&service);
    assert!(matches!(
        service.click(&client, None),
        ClickOutcome::Accepted { persisted: true, .. }
    ));
    let on_disk: serde_json::Value = serde_json::from_slice(
        &std::fs::read(dir.path().join("button_clicks.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(on_disk["count"], 1);
}

#[test]
fn restore_replaces_in_memory_state() {
    let dir = TempDir::new().unwrap();
    let service = GameService::open(config_for(&dir)).unwrap();
    let (client, _) = connect(&service);

    for _ in 0..3 {
        service.click(&client, None);
    }
    let snapshot = service.create_backup().unwrap();

    for _ in 0..4 {
        service.click(&client, None);
    }
    assert_eq!(service.counter().count, 7);

    assert!(service.restore_backup(&snapshot));
    assert_eq!(service.counter().count, 3);

    service.click(&client, None);
    let reopened = GameService::open(config_for(&dir)).unwrap();
    assert_eq!(reopened.counter().count, 4);
}

#[test]
fn concurrent_connections_respect_capacity() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);
    config.rate_limit.max_connections = 8;
    config.features.stats = false;
    let service = Arc::new(GameService::open(config).unwrap());

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || matches!(service.connect(), ConnectOutcome::Connected { .. }))
        })
        .collect();
    let connected = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(connected, 8);
    assert_eq!(service.health().connections, 8);
    assert_eq!(service.metrics().connections_rejected.get(), 24);
}

#[test]
fn concurrent_clicks_are_all_persisted() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(GameService::open(config_for(&dir)).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let client = format!("clicker-{}", i);
                for _ in 0..25 {
                    service.click(&client, None);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(service.counter().count, 100);
    let reopened = GameService::open(config_for(&dir)).unwrap();
    assert_eq!(reopened.counter().count, 100);
}
