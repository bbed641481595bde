//! End-to-end supervision scenario: heartbeat, expiry, cascade.
//!
//! Drives the full wiring (manager, scanner sweep, cascade listener)
//! through the bus and checks the resulting authoritative records.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use vigil::{
    Config, EntityRef, EntitySpec, Event, EventKind, Subscribe, SupervisionManager,
    SupervisionStatus,
};

/// Subscriber that records every event and pings a notifier.
struct Recorder {
    events: std::sync::Mutex<Vec<Event>>,
    notify: Arc<Notify>,
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
        self.notify.notify_one();
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

async fn settle() {
    // Let the cascade listener and fan-out workers drain.
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn expired_equipment_goes_down_and_suspends_its_child() {
    let notify = Arc::new(Notify::new());
    let recorder = Arc::new(Recorder {
        events: std::sync::Mutex::new(Vec::new()),
        notify: Arc::clone(&notify),
    });

    let manager = SupervisionManager::new(
        Config::default(),
        vec![Arc::clone(&recorder) as Arc<dyn Subscribe>],
    );
    manager.start();

    let process = manager
        .register(&EntitySpec::process(1, "P_DAQ_01"))
        .await;
    let eq1 = manager
        .register(&EntitySpec::equipment(100, "EQ1", process.clone()).with_alive_interval(10_000))
        .await;
    let sub1 = manager
        .register(&EntitySpec::subequipment(200, "SUB1", eq1.clone()))
        .await;
    // SUB2 exists nowhere in the topology on purpose.
    let sub2 = EntityRef::subequipment(201, "SUB2");

    // EQ1 beats at a base time and its child is running.
    let t0 = vigil::epoch_millis() - 15_000;
    manager.liveness().touch(&eq1, t0).await.unwrap();
    manager.registry().resume(&eq1, t0, "up").await.unwrap();
    manager.registry().resume(&sub1, t0, "up").await.unwrap();
    settle().await;

    // Scanner runs 15s after the touch: interval 10s + grace 3.33s exceeded.
    let report = manager.scanner().sweep(t0 + 15_000).await;
    assert_eq!(report.expired, 1);
    settle().await;

    // EQ1 is down with an "expired" description at the recorded last beat.
    let eq_rec = manager.registry().get(&eq1).await.unwrap();
    assert_eq!(eq_rec.status, SupervisionStatus::Down);
    assert!(eq_rec.description.contains("expired"));
    assert_eq!(eq_rec.status_time, t0);

    // SUB1 was suspended with the parent's status-change timestamp.
    let sub_rec = manager.registry().get(&sub1).await.unwrap();
    assert_eq!(sub_rec.status, SupervisionStatus::Down);
    assert_eq!(sub_rec.status_time, eq_rec.status_time);
    assert!(sub_rec.description.contains("parent Equipment"));

    // SUB2 never existed: no record was created for it.
    assert!(manager.registry().get(&sub2).await.is_err());

    // The subscriber saw exactly one availability flip for EQ1 and one for
    // SUB1, and none for SUB2.
    let events = recorder.events.lock().unwrap();
    let changes: Vec<&Event> = events
        .iter()
        .filter(|e| e.kind == EventKind::StatusChange)
        .collect();
    assert_eq!(
        changes
            .iter()
            .filter(|e| e.entity.as_ref() == Some(&eq1))
            .count(),
        2, // up at t0, down on expiry
    );
    assert!(changes.iter().all(|e| e.entity.as_ref() != Some(&sub2)));

    manager.stop();
}

#[tokio::test]
async fn fault_signals_drive_equipment_and_cascade_to_children() {
    let manager = SupervisionManager::new(Config::default(), Vec::new());
    manager.start();

    let process = manager
        .register(&EntitySpec::process(1, "P_DAQ_01"))
        .await;
    let eq = manager
        .register(&EntitySpec::equipment(100, "E_PUMP", process.clone()).with_fault_channel())
        .await;
    let sub = manager
        .register(&EntitySpec::subequipment(200, "S_VALVE", eq.clone()))
        .await;

    // Equipment and child start running.
    manager.registry().resume(&eq, 1_000, "up").await.unwrap();
    manager.registry().resume(&sub, 1_000, "up").await.unwrap();
    settle().await;

    // Fault raised: equipment goes down, child is auto-suspended.
    manager.on_fault(&eq, true, 5_000).await.unwrap();
    settle().await;

    let eq_rec = manager.registry().get(&eq).await.unwrap();
    assert_eq!(eq_rec.status, SupervisionStatus::Down);
    assert!(eq_rec.description.contains("Communication fault"));

    let sub_rec = manager.registry().get(&sub).await.unwrap();
    assert_eq!(sub_rec.status, SupervisionStatus::Down);
    assert_eq!(sub_rec.status_time, 5_000);

    // A stale fault clear (older timestamp) changes nothing.
    manager.on_fault(&eq, false, 4_000).await.unwrap();
    settle().await;
    assert_eq!(
        manager.registry().get(&eq).await.unwrap().status,
        SupervisionStatus::Down
    );

    // A fresh clear resumes equipment and child.
    manager.on_fault(&eq, false, 6_000).await.unwrap();
    settle().await;

    assert_eq!(
        manager.registry().get(&eq).await.unwrap().status,
        SupervisionStatus::Running
    );
    let sub_rec = manager.registry().get(&sub).await.unwrap();
    assert_eq!(sub_rec.status, SupervisionStatus::Running);
    assert!(sub_rec.description.contains("RUNNING"));

    manager.stop();
}
