//! # comprehensive storage tests
//!
//! why: verify all storage scenarios work correctly
//! relations: tests raft-storage crate, mirrors raft-core's entry log through its hooks
//! what: persistence, crash recovery, compaction, atomic writes, edge cases

use std::fs;

use raft_core::{EntryLog, HostResult, LogEntry, LogHooks, LogIndex};
use raft_storage::{FileStorage, InMemoryStorage, PersistedLog, Storage, StorageError};
use tempfile::tempdir;

fn entry(id: u32, payload: &[u8]) -> LogEntry {
    LogEntry::new(1, id, payload.to_vec())
}

fn append_all(storage: &mut impl Storage, entries: &[LogEntry]) {
    let start = storage.load_log().unwrap().last_index() + 1;
    for (offset, e) in entries.iter().enumerate() {
        storage.append_entry(start + offset as LogIndex, e).unwrap();
    }
}

// =============================================================================
// SECTION 1: IN-MEMORY STORAGE TESTS
// =============================================================================

mod in_memory_basic {
    use super::*;

    #[test]
    fn new_storage_has_default_values() {
        let storage = InMemoryStorage::new();
        let state = storage.load().unwrap();

        assert_eq!(state.term, 0);
        assert_eq!(state.voted_for, None);
        assert_eq!(state.log, PersistedLog::default());
    }

    #[test]
    fn save_voted_for_none() {
        let mut storage = InMemoryStorage::new();

        storage.save_term_and_vote(10, None).unwrap();
        let (term, voted_for) = storage.load_term_and_vote().unwrap();

        assert_eq!(term, 10);
        assert_eq!(voted_for, None);
    }

    #[test]
    fn overwrite_term_and_vote() {
        let mut storage = InMemoryStorage::new();

        storage.save_term_and_vote(1, Some(1)).unwrap();
        storage.save_term_and_vote(5, Some(3)).unwrap();

        let (term, voted_for) = storage.load_term_and_vote().unwrap();
        assert_eq!(term, 5);
        assert_eq!(voted_for, Some(3));
    }
}

mod in_memory_log {
    use super::*;

    #[test]
    fn append_in_batches() {
        let mut storage = InMemoryStorage::new();
        append_all(&mut storage, &[entry(1, b"a"), entry(2, b"b")]);
        append_all(&mut storage, &[entry(3, b"c")]);

        let log = storage.load_log().unwrap();
        assert_eq!(log.last_index(), 3);
        let ids: Vec<u32> = log.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let mut storage = InMemoryStorage::new();
        append_all(&mut storage, &[entry(1, b"a")]);

        let err = storage.append_entry(1, &entry(2, b"b")).unwrap_err();
        assert!(matches!(
            err,
            StorageError::OutOfOrder {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn truncate_all_entries() {
        let mut storage = InMemoryStorage::new();
        append_all(&mut storage, &[entry(1, b"a"), entry(2, b"b")]);

        storage.truncate_log_from(1).unwrap();
        assert!(storage.load_log().unwrap().entries.is_empty());
    }

    #[test]
    fn truncate_past_tail_is_noop() {
        let mut storage = InMemoryStorage::new();
        append_all(&mut storage, &[entry(1, b"a")]);

        storage.truncate_log_from(5).unwrap();
        assert_eq!(storage.load_log().unwrap().last_index(), 1);
    }

    #[test]
    fn clear_resets_all_state() {
        let mut storage = InMemoryStorage::new();
        storage.save_term_and_vote(5, Some(3)).unwrap();
        append_all(&mut storage, &[entry(1, b"a")]);
        storage.compact_log_through(1).unwrap();

        storage.clear().unwrap();

        let state = storage.load().unwrap();
        assert_eq!(state.term, 0);
        assert_eq!(state.voted_for, None);
        assert_eq!(state.log.base, 0);
    }
}

// =============================================================================
// SECTION 2: FILE STORAGE TESTS
// =============================================================================

mod file_storage_basic {
    use super::*;

    #[test]
    fn create_storage_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raft_data");

        let storage = FileStorage::new(&path).unwrap();

        assert!(path.exists());
        assert_eq!(storage.dir(), path.as_path());
    }

    #[test]
    fn new_storage_has_default_values() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        let state = storage.load().unwrap();

        assert_eq!(state.term, 0);
        assert_eq!(state.voted_for, None);
        assert!(state.log.entries.is_empty());
    }

    #[test]
    fn save_creates_meta_file() {
        let dir = tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();

        storage.save_term_and_vote(5, Some(2)).unwrap();

        assert!(dir.path().join("meta.json").exists());
    }
}

mod file_storage_log {
    use super::*;

    #[test]
    fn append_creates_log_file() {
        let dir = tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();

        append_all(&mut storage, &[entry(1, b"cmd")]);

        assert!(dir.path().join("log.json").exists());
    }

    #[test]
    fn append_and_load_entries() {
        let dir = tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();

        append_all(
            &mut storage,
            &[entry(1, b"INVITE sip:alice"), entry(2, b"BYE sip:alice")],
        );

        let log = storage.load_log().unwrap();
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.entries[0].payload, b"INVITE sip:alice".to_vec());
    }

    #[test]
    fn truncate_log() {
        let dir = tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();

        append_all(&mut storage, &[entry(1, &[1]), entry(2, &[2]), entry(3, &[3])]);

        storage.truncate_log_from(2).unwrap();

        let log = storage.load_log().unwrap();
        assert_eq!(log.entries.len(), 1);
        assert_eq!(log.entries[0].id, 1);
    }

    #[test]
    fn compaction_survives_restart() {
        let dir = tempdir().unwrap();

        {
            let mut storage = FileStorage::new(dir.path()).unwrap();
            append_all(&mut storage, &[entry(1, b"a"), entry(2, b"b"), entry(3, b"c")]);
            storage.compact_log_through(2).unwrap();
        }

        let storage = FileStorage::new(dir.path()).unwrap();
        let log = storage.load_log().unwrap();
        assert_eq!(log.base, 2);
        assert_eq!(log.entries.len(), 1);
        assert_eq!(log.entries[0].id, 3);
        assert_eq!(log.last_index(), 3);
    }
}

// =============================================================================
// SECTION 3: CRASH RECOVERY / PERSISTENCE TESTS
// =============================================================================

mod crash_recovery {
    use super::*;

    #[test]
    fn multiple_restarts_preserve_state() {
        let dir = tempdir().unwrap();

        // session 1
        {
            let mut storage = FileStorage::new(dir.path()).unwrap();
            storage.save_term_and_vote(1, Some(1)).unwrap();
            append_all(&mut storage, &[entry(1, b"a")]);
        }

        // session 2
        {
            let mut storage = FileStorage::new(dir.path()).unwrap();
            storage.save_term_and_vote(2, Some(2)).unwrap();
            append_all(&mut storage, &[LogEntry::new(2, 2, b"b".to_vec())]);
        }

        // session 3 - verify
        {
            let storage = FileStorage::new(dir.path()).unwrap();
            let state = storage.load().unwrap();

            assert_eq!(state.term, 2);
            assert_eq!(state.voted_for, Some(2));
            assert_eq!(state.log.entries.len(), 2);
            assert_eq!(state.log.entries[1].term, 2);
        }
    }

    #[test]
    fn clear_removes_all_files() {
        let dir = tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();

        storage.save_term_and_vote(5, Some(3)).unwrap();
        append_all(&mut storage, &[entry(1, b"cmd")]);

        storage.clear().unwrap();

        assert!(!dir.path().join("meta.json").exists());
        assert!(!dir.path().join("log.json").exists());
        assert_eq!(storage.load().unwrap().term, 0);
    }

    #[test]
    fn corrupt_log_is_reported() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        fs::write(dir.path().join("log.json"), "[1, 2").unwrap();

        assert!(matches!(storage.load_log(), Err(StorageError::Corrupt(_))));
    }
}

// =============================================================================
// SECTION 4: ATOMIC WRITE TESTS
// =============================================================================

mod atomic_writes {
    use super::*;

    #[test]
    fn files_are_valid_json() {
        let dir = tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();

        storage.save_term_and_vote(5, Some(2)).unwrap();
        append_all(&mut storage, &[entry(1, b"cmd")]);

        for name in ["meta.json", "log.json"] {
            let contents = fs::read_to_string(dir.path().join(name)).unwrap();
            let _: serde_json::Value = serde_json::from_str(&contents).expect("valid JSON");
        }
    }

    #[test]
    fn no_temp_files_remain() {
        let dir = tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();

        storage.save_term_and_vote(5, Some(2)).unwrap();
        append_all(&mut storage, &[entry(1, b"cmd")]);
        storage.truncate_log_from(1).unwrap();

        assert!(!dir.path().join("meta.tmp").exists());
        assert!(!dir.path().join("log.tmp").exists());
    }

    #[test]
    fn failed_append_leaves_log_untouched() {
        let dir = tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();
        append_all(&mut storage, &[entry(1, b"cmd")]);

        assert!(storage.append_entry(7, &entry(7, b"gap")).is_err());
        assert_eq!(storage.load_log().unwrap().last_index(), 1);
    }
}

// =============================================================================
// SECTION 5: MIRRORING THE CORE ENTRY LOG
// =============================================================================

mod entry_log_mirror {
    use super::*;

    /// forwards the core's log hooks into storage, as the driver's host does
    struct Mirror<S>(S);

    impl<S: Storage> LogHooks for Mirror<S> {
        fn log_offer(&mut self, entry: &LogEntry, index: LogIndex) -> HostResult {
            Ok(self.0.append_entry(index, entry)?)
        }

        fn log_poll(&mut self, _: &LogEntry, index: LogIndex) -> HostResult {
            Ok(self.0.compact_log_through(index)?)
        }

        fn log_pop(&mut self, _: &LogEntry, index: LogIndex) -> HostResult {
            Ok(self.0.truncate_log_from(index)?)
        }
    }

    fn assert_mirrors(log: &EntryLog, storage: &impl Storage) {
        let persisted = storage.load_log().unwrap();
        assert_eq!(persisted.base, log.base());
        assert_eq!(persisted.last_index(), log.current_index());
        let live: Vec<LogEntry> = log.iter().map(|(_, e)| e.clone()).collect();
        assert_eq!(persisted.entries, live);
    }

    #[test]
    fn append_truncate_compact_stay_in_step() {
        let dir = tempdir().unwrap();
        let mut hooks = Mirror(FileStorage::new(dir.path()).unwrap());
        let mut log = EntryLog::new();

        for id in 1..=6 {
            log.append(entry(id, b"op"), &mut hooks).unwrap();
        }
        assert_mirrors(&log, &hooks.0);

        log.truncate_from(5, &mut hooks).unwrap();
        assert_mirrors(&log, &hooks.0);

        log.poll_oldest(&mut hooks).unwrap();
        log.poll_oldest(&mut hooks).unwrap();
        assert_mirrors(&log, &hooks.0);

        log.append(entry(7, b"op"), &mut hooks).unwrap();
        assert_mirrors(&log, &hooks.0);
    }

    #[test]
    fn restored_log_matches_persisted_one() {
        let mut hooks = Mirror(InMemoryStorage::new());
        let mut log = EntryLog::new();
        for id in 1..=4 {
            log.append(entry(id, b"op"), &mut hooks).unwrap();
        }
        log.poll_oldest(&mut hooks).unwrap();

        let persisted = hooks.0.load_log().unwrap();
        let restored = EntryLog::from_entries(persisted.base, persisted.entries);
        assert_eq!(restored.base(), 1);
        assert_eq!(restored.current_index(), 4);
        assert_eq!(restored.entry_at(2).map(|e| e.id), Some(2));
    }

    #[test]
    fn storage_failure_blocks_the_append() {
        let mut hooks = Mirror(InMemoryStorage::new());
        hooks.0.append_entry(1, &entry(1, b"stray")).unwrap();

        let mut log = EntryLog::new();
        assert!(log.append(entry(1, b"op"), &mut hooks).is_err());
        assert!(log.is_empty());
    }
}

// =============================================================================
// SECTION 6: EDGE CASES
// =============================================================================

mod edge_cases {
    use super::*;

    #[test]
    fn large_log_entry() {
        let mut storage = InMemoryStorage::new();

        // 1MB payload
        append_all(&mut storage, &[entry(1, &vec![0u8; 1024 * 1024])]);
        let log = storage.load_log().unwrap();

        assert_eq!(log.entries[0].payload.len(), 1024 * 1024);
    }

    #[test]
    fn binary_and_unicode_payloads() {
        let dir = tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();

        let binary = vec![0x00, 0xFF, 0x7F, 0x80, 0xFE];
        let unicode = "SUBSCRIBE sip:键@例子 🎉".as_bytes().to_vec();
        append_all(&mut storage, &[entry(1, &binary), entry(2, &unicode)]);

        let log = storage.load_log().unwrap();
        assert_eq!(log.entries[0].payload, binary);
        assert_eq!(log.entries[1].payload, unicode);
    }

    #[test]
    fn very_high_term_number() {
        let mut storage = InMemoryStorage::new();

        storage.save_term_and_vote(u64::MAX, Some(u64::MAX)).unwrap();
        let (term, voted_for) = storage.load_term_and_vote().unwrap();

        assert_eq!(term, u64::MAX);
        assert_eq!(voted_for, Some(u64::MAX));
    }
}

// =============================================================================
// SECTION 7: STORAGE TRAIT POLYMORPHISM
// =============================================================================

mod trait_polymorphism {
    use super::*;

    fn test_storage_impl<S: Storage>(storage: &mut S) {
        storage.save_term_and_vote(5, Some(2)).unwrap();
        let (term, voted_for) = storage.load_term_and_vote().unwrap();
        assert_eq!(term, 5);
        assert_eq!(voted_for, Some(2));

        append_all(storage, &[entry(1, b"cmd"), entry(2, b"cmd")]);
        assert_eq!(storage.load_log().unwrap().last_index(), 2);

        storage.compact_log_through(1).unwrap();
        storage.truncate_log_from(2).unwrap();
        let log = storage.load_log().unwrap();
        assert!(log.entries.is_empty());
        assert_eq!(log.last_index(), 1);

        storage.clear().unwrap();
        let (term, _) = storage.load_term_and_vote().unwrap();
        assert_eq!(term, 0);
    }

    #[test]
    fn in_memory_implements_trait() {
        let mut storage = InMemoryStorage::new();
        test_storage_impl(&mut storage);
    }

    #[test]
    fn file_storage_implements_trait() {
        let dir = tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();
        test_storage_impl(&mut storage);
    }
}
