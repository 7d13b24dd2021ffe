//! # PostgreSQL Engine
//!
//! Runs only when `HMS_TEST_DATABASE_URL` points at a scratch database;
//! otherwise every test returns immediately. Room numbers carry a per-run
//! suffix so repeated runs against one database do not collide.

use std::time::Duration;

use chrono::Utc;
use hms_core::validate::MAX_ROOM_NUMBER_LEN;
use hms_core::{Actor, PatientId, Role, RoomStatus};
use hms_occupancy::{OccupancyError, OccupancyService};
use hms_store::{PgStore, ResourceStore, StoreConfig, StoreError, StoreTransaction};

async fn connect(lock_timeout: Duration) -> Option<PgStore> {
    let url = std::env::var("HMS_TEST_DATABASE_URL").ok()?;
    let store = PgStore::connect(&url, StoreConfig::default().with_lock_timeout(lock_timeout))
        .await
        .expect("connect to HMS_TEST_DATABASE_URL");
    store.migrate().await.expect("apply migrations");
    Some(store)
}

/// A room number unique to this run that stays within the column width.
fn unique(prefix: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default() % 1_000_000_000_000;
    let number = format!("{prefix}-{}-{nanos}", std::process::id() % 100_000);
    assert!(number.len() <= MAX_ROOM_NUMBER_LEN, "{number} is too long");
    number
}

#[test]
fn generated_room_numbers_fit_the_column() {
    assert!(unique("index").len() <= MAX_ROOM_NUMBER_LEN);
}

fn staff() -> Actor {
    Actor::new(1, Role::Staff)
}

#[tokio::test]
async fn pg_admit_discharge_cycle() {
    let Some(store) = connect(Duration::from_secs(5)).await else {
        return;
    };
    let svc = OccupancyService::new(store);
    let room = svc.create_room(&staff(), &unique("cycle"), Some("ICU")).await.unwrap();

    let adm = svc
        .admit(&staff(), PatientId(1), room, Utc::now(), Some("note"))
        .await
        .unwrap();
    assert_eq!(svc.room(room).await.unwrap().status, RoomStatus::Occupied);
    assert!(matches!(
        svc.admit(&staff(), PatientId(2), room, Utc::now(), None).await,
        Err(OccupancyError::RoomNotAvailable { .. })
    ));

    svc.discharge(&staff(), adm).await.unwrap();
    assert_eq!(svc.room(room).await.unwrap().status, RoomStatus::Available);
    assert!(matches!(
        svc.discharge(&staff(), adm).await,
        Err(OccupancyError::AlreadyDischarged(_))
    ));

    svc.delete_room(&staff(), room).await.unwrap();
    assert!(svc.store().admission(adm).await.unwrap().is_none());
}

#[tokio::test]
async fn pg_duplicate_room_number() {
    let Some(store) = connect(Duration::from_secs(5)).await else {
        return;
    };
    let svc = OccupancyService::new(store);
    let number = unique("dup");
    let room = svc.create_room(&staff(), &number, None).await.unwrap();
    assert!(matches!(
        svc.create_room(&staff(), &number, None).await,
        Err(OccupancyError::DuplicateNumber(_))
    ));
    svc.delete_room(&staff(), room).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pg_concurrent_admits() {
    let Some(store) = connect(Duration::from_secs(5)).await else {
        return;
    };
    let svc = OccupancyService::new(store);
    let room = svc.create_room(&staff(), &unique("race"), None).await.unwrap();

    let mut handles = Vec::new();
    for patient in 1..=8 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.admit(&staff(), PatientId(patient), room, Utc::now(), None)
                .await
        }));
    }
    let mut admitted = Vec::new();
    for handle in handles {
        if let Ok(id) = handle.await.unwrap() {
            admitted.push(id);
        }
    }
    assert_eq!(admitted.len(), 1);

    svc.delete_admission(&staff(), admitted[0]).await.unwrap();
    svc.delete_room(&staff(), room).await.unwrap();
}

#[tokio::test]
async fn pg_lock_timeout_is_busy() {
    let Some(store) = connect(Duration::from_millis(200)).await else {
        return;
    };
    let svc = OccupancyService::new(store);
    let room = svc.create_room(&staff(), &unique("busy"), None).await.unwrap();

    let mut holder = svc.store().begin().await.unwrap();
    holder.lock_room(room).await.unwrap();

    let err = svc
        .admit(&staff(), PatientId(1), room, Utc::now(), None)
        .await
        .unwrap_err();
    assert!(err.is_retryable(), "expected busy, got {err}");
    holder.rollback().await.unwrap();

    assert_eq!(svc.room(room).await.unwrap().status, RoomStatus::Available);
    svc.delete_room(&staff(), room).await.unwrap();
}

#[tokio::test]
async fn pg_partial_index_rejects_second_open_admission() {
    let Some(store) = connect(Duration::from_secs(5)).await else {
        return;
    };
    let svc = OccupancyService::new(store.clone());
    let room = svc.create_room(&staff(), &unique("index"), None).await.unwrap();
    svc.admit(&staff(), PatientId(1), room, Utc::now(), None)
        .await
        .unwrap();

    // Bypass the service and write a second open admission directly.
    let mut tx = store.begin().await.unwrap();
    let err = tx
        .insert_admission(&hms_core::NewAdmission {
            patient_id: PatientId(2),
            room_id: room,
            admitted_on: Utc::now(),
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::UniqueViolation { ref constraint } if constraint == hms_store::ONE_OPEN_ADMISSION_INDEX
    ));
    drop(tx);

    let open = svc.store().snapshot().await.unwrap().open_admissions;
    let mine: Vec<_> = open.iter().filter(|a| a.room_id == room).collect();
    svc.delete_admission(&staff(), mine[0].id).await.unwrap();
    svc.delete_room(&staff(), room).await.unwrap();
}
