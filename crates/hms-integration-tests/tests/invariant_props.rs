//! # Invariant Properties
//!
//! Random sequences of room and admission operations. Whatever each
//! operation returns, the store must satisfy the occupancy rule afterwards,
//! and no operation may fail with an internal error.

use chrono::Utc;
use hms_core::{Actor, AdmissionChanges, AdmissionId, PatientId, Role, RoomId, RoomStatus};
use hms_occupancy::{ErrorKind, OccupancyService};
use hms_store::MemoryStore;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    CreateRoom(RoomStatus),
    Admit { patient: i64, room: i64 },
    Transfer { admission: i64, room: i64 },
    Discharge(i64),
    DeleteAdmission(i64),
    UpdateRoom { room: i64, status: RoomStatus },
    DeleteRoom(i64),
}

fn status() -> impl Strategy<Value = RoomStatus> {
    prop_oneof![
        Just(RoomStatus::Available),
        Just(RoomStatus::Occupied),
        Just(RoomStatus::Maintenance),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => status().prop_map(Op::CreateRoom),
        4 => (1i64..6, 1i64..6).prop_map(|(patient, room)| Op::Admit { patient, room }),
        3 => (1i64..8, 1i64..6).prop_map(|(admission, room)| Op::Transfer { admission, room }),
        2 => (1i64..8).prop_map(Op::Discharge),
        1 => (1i64..8).prop_map(Op::DeleteAdmission),
        2 => (1i64..6, status()).prop_map(|(room, status)| Op::UpdateRoom { room, status }),
        1 => (1i64..6).prop_map(Op::DeleteRoom),
    ]
}

async fn apply(svc: &OccupancyService<MemoryStore>, step: usize, op: &Op) -> Option<ErrorKind> {
    let actor = Actor::new(1, Role::Admin);
    let result = match op {
        Op::CreateRoom(status) => svc
            .create_room_with_status(&actor, &format!("R{step}"), None, *status)
            .await
            .map(|_| ()),
        Op::Admit { patient, room } => svc
            .admit(&actor, PatientId(*patient), RoomId(*room), Utc::now(), None)
            .await
            .map(|_| ()),
        Op::Transfer { admission, room } => {
            let changes = AdmissionChanges {
                patient_id: Some(PatientId(1)),
                room_id: Some(RoomId(*room)),
                admitted_on: Some(Utc::now()),
                notes: Some(format!("step {step}")),
            };
            svc.transfer(&actor, AdmissionId(*admission), changes)
                .await
                .map(|_| ())
        }
        Op::Discharge(admission) => svc
            .discharge(&actor, AdmissionId(*admission))
            .await
            .map(|_| ()),
        Op::DeleteAdmission(admission) => {
            svc.delete_admission(&actor, AdmissionId(*admission)).await
        }
        Op::UpdateRoom { room, status } => svc
            .update_room(&actor, RoomId(*room), &format!("U{room}"), None, *status)
            .await
            .map(|_| ()),
        Op::DeleteRoom(room) => svc.delete_room(&actor, RoomId(*room)).await,
    };
    result.err().map(|e| e.kind())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_operations_preserve_occupancy(ops in prop::collection::vec(op(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let svc = OccupancyService::new(MemoryStore::default());
            for (step, op) in ops.iter().enumerate() {
                let kind = apply(&svc, step, op).await;
                prop_assert_ne!(kind, Some(ErrorKind::Internal), "step {} {:?}", step, op);
                prop_assert_ne!(kind, Some(ErrorKind::Busy), "step {} {:?}", step, op);

                let report = svc.audit().await.unwrap();
                prop_assert!(
                    report.is_consistent(),
                    "after step {} {:?}: {:?}",
                    step,
                    op,
                    report.violations
                );
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
