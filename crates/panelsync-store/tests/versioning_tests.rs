//! Versioning property tests
//!
//! Versions are gapless and start at 1, snapshots never change after
//! creation, and rollback reproduces the snapshot exactly.

use panelsync_artifact::{ConfigPath, ControllerId, FileSet};
use panelsync_store::{DraftStore, LiveStateWriter, SnapshotManager};
use proptest::prelude::*;
use std::sync::Arc;

fn ctrl() -> ControllerId {
    ControllerId::new("conf-room").unwrap()
}

#[derive(Debug, Clone)]
enum Op {
    Write(u8, u8),
    Delete(u8),
    Deploy,
    Rollback(u8),
    Discard,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..6, any::<u8>()).prop_map(|(p, v)| Op::Write(p, v)),
        1 => (0u8..6).prop_map(Op::Delete),
        2 => Just(Op::Deploy),
        1 => (0u8..8).prop_map(Op::Rollback),
        1 => Just(Op::Discard),
    ]
}

fn path(n: u8) -> ConfigPath {
    ConfigPath::page(&format!("page{n}")).unwrap()
}

proptest! {
    #[test]
    fn versions_gapless_and_snapshots_frozen(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mgr = SnapshotManager::new(Arc::new(DraftStore::new()));
        let mut expected: Vec<FileSet> = Vec::new();

        for op in ops {
            match op {
                Op::Write(p, v) => {
                    mgr.drafts().write(&ctrl(), path(p), format!("{{\"v\":{v}}}"), "user:prop");
                }
                Op::Delete(p) => {
                    let _ = mgr.drafts().delete(&ctrl(), &path(p));
                }
                Op::Deploy => {
                    let draft = mgr.drafts().files(&ctrl());
                    match mgr.deploy(&ctrl(), "user:prop", "prop") {
                        Ok(result) => {
                            prop_assert_eq!(result.version, expected.len() as u64 + 1);
                            expected.push(draft);
                        }
                        Err(_) => prop_assert!(draft.is_empty()),
                    }
                }
                Op::Rollback(v) => {
                    let version = u64::from(v);
                    let before = mgr.drafts().files(&ctrl());
                    match mgr.rollback(&ctrl(), version) {
                        Ok(_) => {
                            let idx = usize::try_from(version - 1).unwrap();
                            prop_assert_eq!(&mgr.drafts().files(&ctrl()), &expected[idx]);
                        }
                        Err(_) => {
                            prop_assert!(version == 0 || version as usize > expected.len());
                            prop_assert_eq!(mgr.drafts().files(&ctrl()), before);
                        }
                    }
                }
                Op::Discard => {
                    mgr.discard(&ctrl());
                    prop_assert_eq!(mgr.drafts().len(&ctrl()), 0);
                }
            }

            // Every recorded snapshot still matches what was frozen
            for (i, files) in expected.iter().enumerate() {
                let snap = mgr.get(&ctrl(), i as u64 + 1).unwrap();
                prop_assert_eq!(&snap.files, files);
                prop_assert_eq!(snap.checksum, files.checksum());
            }
        }

        let listed: Vec<u64> = mgr.list_versions(&ctrl()).iter().map(|v| v.version).collect();
        let want: Vec<u64> = (1..=expected.len() as u64).rev().collect();
        prop_assert_eq!(listed, want);
    }

    #[test]
    fn status_is_idempotent(writes in 0usize..5, deploy in any::<bool>(), live in any::<bool>()) {
        let mgr = SnapshotManager::new(Arc::new(DraftStore::new()));
        for i in 0..writes {
            mgr.drafts().write(&ctrl(), ConfigPath::scene(&format!("s{i}")).unwrap(), "{}", "user:prop");
        }
        if deploy && writes > 0 {
            mgr.deploy(&ctrl(), "user:prop", "v1").unwrap();
            if live {
                mgr.mark_live(&ctrl(), 1).unwrap();
            }
        }
        let first = mgr.get_status(&ctrl());
        let second = mgr.get_status(&ctrl());
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.draft_file_count, writes);
        prop_assert_eq!(
            first.needs_sync,
            first.deployed_version.is_some() && first.deployed_version != first.live_version
        );
    }
}

#[test]
fn concurrent_deploys_get_distinct_versions() {
    let mgr = Arc::new(SnapshotManager::new(Arc::new(DraftStore::new())));
    mgr.drafts().write(&ctrl(), path(0), "{}", "user:seed");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let mgr = Arc::clone(&mgr);
            std::thread::spawn(move || {
                let mut versions = Vec::new();
                for j in 0..10u8 {
                    mgr.drafts()
                        .write(&ctrl(), path(j % 4), format!("{{\"t\":{i}}}"), "user:t");
                    versions.push(mgr.deploy(&ctrl(), "user:t", "race").unwrap().version);
                }
                versions
            })
        })
        .collect();

    let mut all: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (1..=80).collect::<Vec<_>>());

    // Each snapshot is internally consistent with its checksum
    for v in 1..=80 {
        let snap = mgr.get(&ctrl(), v).unwrap();
        assert_eq!(snap.checksum, snap.files.checksum());
    }
}
