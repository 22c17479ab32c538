//! Property tests: whatever operators do, no serial is ever referenced by
//! two open tasks, failed commands change nothing, and device history only
//! grows.

use std::collections::HashMap;

use proptest::prelude::*;

use posfleet_core::{AssetTag, SerialNumber};
use posfleet_provisioning::{
    Fleet, FleetConfig, FleetSnapshot, RegisterDevice, RegistrationApproval, SalesRequest,
    TaskFilter,
};
use posfleet_state::{DeviceStatus, ProvisioningInput, Requester, RequesterRole, TaskKind};

const POOL: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    Activate,
    Exchange { release: usize },
    Retrieve { release: usize },
    Ready { task: usize },
    Provision { task: usize, serial: usize },
    Complete { task: usize },
    Remove { serial: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Activate),
        (0..POOL).prop_map(|release| Op::Exchange { release }),
        (0..POOL).prop_map(|release| Op::Retrieve { release }),
        (0..8usize).prop_map(|task| Op::Ready { task }),
        (0..8usize, 0..POOL).prop_map(|(task, serial)| Op::Provision { task, serial }),
        (0..8usize).prop_map(|task| Op::Complete { task }),
        (0..POOL).prop_map(|serial| Op::Remove { serial }),
    ]
}

fn serial(i: usize) -> String {
    format!("SN{i:03}")
}

fn requester() -> Requester {
    Requester {
        name: "Ana".into(),
        role: RequesterRole::FieldAgent,
    }
}

fn seeded() -> Fleet {
    let fleet = Fleet::new(FleetConfig::default());
    for i in 0..POOL {
        let status = if i % 2 == 0 {
            DeviceStatus::InStock
        } else {
            DeviceStatus::Active
        };
        fleet
            .register_device(RegisterDevice {
                serial_number: SerialNumber::new(serial(i)).unwrap(),
                asset_tag: AssetTag::new(format!("PAT-{i}")).unwrap(),
                model: "S920".into(),
                status,
                holder: "Central Warehouse".into(),
            })
            .unwrap();
    }
    fleet
}

fn sales(kind: TaskKind, release: usize) -> SalesRequest {
    SalesRequest {
        kind,
        client_name: "Oficina Beta".into(),
        release_serial: SerialNumber::new(serial(release)).unwrap(),
        reason_code: "OTHER".into(),
        details: String::new(),
    }
}

fn run(fleet: &Fleet, op: &Op) {
    let ids: Vec<_> = {
        let mut tasks = fleet.list_tasks(&TaskFilter::default());
        tasks.sort_by_key(|t| t.id());
        tasks.into_iter().map(|t| t.id()).collect()
    };
    let pick = |i: usize| ids.get(i % ids.len().max(1)).copied();

    let _ = match op {
        Op::Activate => fleet
            .open_activation(
                RegistrationApproval {
                    client_name: "Oficina Alfa".into(),
                    ..Default::default()
                },
                requester(),
            )
            .map(drop),
        Op::Exchange { release } => fleet
            .open_sales_request(sales(TaskKind::Exchange, *release), requester())
            .map(drop),
        Op::Retrieve { release } => fleet
            .open_sales_request(sales(TaskKind::Retrieval, *release), requester())
            .map(drop),
        Op::Ready { task } => match pick(*task) {
            Some(id) => fleet.mark_ready(id).map(drop),
            None => Ok(()),
        },
        Op::Provision { task, serial: s } => match pick(*task) {
            Some(id) => fleet
                .issue_provisioning(
                    id,
                    &ProvisioningInput {
                        serial_number: Some(serial(*s)),
                        asset_tag: Some(format!("PAT-{s}")),
                        provisioning_code: Some("123456".into()),
                    },
                )
                .map(drop),
            None => Ok(()),
        },
        Op::Complete { task } => match pick(*task) {
            Some(id) => fleet.complete(id).map(drop),
            None => Ok(()),
        },
        Op::Remove { serial: s } => fleet
            .remove_device(&SerialNumber::new(serial(*s)).unwrap())
            .map(drop),
    };
}

fn history_lengths(snap: &FleetSnapshot) -> HashMap<String, usize> {
    snap.devices
        .iter()
        .map(|(k, d)| (k.as_str().to_string(), d.history().len()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_single_ownership_holds(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let fleet = seeded();
        for op in &ops {
            let before = fleet.snapshot().unwrap();
            run(&fleet, op);
            let after = fleet.snapshot().unwrap();

            let violations = after.violations();
            prop_assert!(violations.is_empty(), "after {:?}: {:?}", op, violations);

            // History never shrinks for a device that is still registered.
            let lens = history_lengths(&after);
            for (serial, old_len) in history_lengths(&before) {
                if let Some(new_len) = lens.get(&serial) {
                    prop_assert!(*new_len >= old_len);
                }
            }
        }
    }
}
