//! Apply, verify, and revert the task-manager restriction.
//!
//! A write call's return status is never trusted on its own: every mutation is
//! read back before it counts. Under insufficient privilege some stores accept
//! writes and keep the old value.

use crate::error::{RestrictionError, RestrictionErrorKind};
use curfew_provider::{Hive, RegistryKey, RegistryStore, StoreError};
use log::{debug, info, warn};

/// Policy value that disables the task manager for the current user.
pub const TASK_MANAGER_KEY: RegistryKey = RegistryKey {
    hive: Hive::CurrentUser,
    path: r"Software\Microsoft\Windows\CurrentVersion\Policies\System",
    value_name: "DisableTaskMgr",
};

/// Sentinel meaning "restricted".
pub const RESTRICTED_VALUE: u32 = 1;

/// Throwaway value written and removed to prove write access before touching the real one.
pub(crate) const SCRATCH_VALUE_NAME: &str = "CurfewWriteCheck";
const SCRATCH_MARKER: u32 = 0;

/// Successful result of [`RestrictionController::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// This session moved the value to the restricted sentinel.
    Applied,
    /// The value already held the sentinel; nothing was written.
    AlreadyApplied,
}

/// The single restriction a session manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionState {
    pub key: RegistryKey,
    pub desired_value: u32,
    /// Set only when this process wrote `desired_value`; gates revert.
    pub applied_by_session: bool,
    /// Value observed before apply, restored on revert (`None` deletes the value).
    pub prior_value: Option<u32>,
    /// Whether apply had to create the containing key.
    pub created_key: bool,
}

impl RestrictionState {
    pub fn new(key: RegistryKey, desired_value: u32) -> Self {
        Self {
            key,
            desired_value,
            applied_by_session: false,
            prior_value: None,
            created_key: false,
        }
    }
}

#[derive(Debug)]
pub struct RestrictionController<S> {
    store: S,
    state: RestrictionState,
}

impl<S> RestrictionController<S>
where
    S: RegistryStore,
{
    /// Controller for the task-manager policy value.
    pub fn new(store: S) -> Self {
        Self::with_key(store, TASK_MANAGER_KEY, RESTRICTED_VALUE)
    }

    pub fn with_key(store: S, key: RegistryKey, desired_value: u32) -> Self {
        Self {
            store,
            state: RestrictionState::new(key, desired_value),
        }
    }

    pub fn state(&self) -> &RestrictionState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn applied_by_session(&self) -> bool {
        self.state.applied_by_session
    }

    /// Read the persisted value, validating it is a 32-bit integer.
    pub fn current_value(&self) -> Result<Option<u32>, RestrictionError> {
        self.read()
            .map_err(|err| self.error(RestrictionErrorKind::ReadFailed, err))
    }

    /// Put the restriction in place and confirm it stuck.
    ///
    /// # Errors
    /// Returns a `RestrictionError` tagged with the failing step. A verification
    /// mismatch rolls the value back to what was observed before the write.
    pub fn apply(&mut self) -> Result<ApplyOutcome, RestrictionError> {
        let key = self.state.key;
        let desired = self.state.desired_value;
        let observed = self.current_value()?;

        if observed == Some(desired) {
            info!("restriction {key} already set to {desired}; leaving it untouched");
            return Ok(ApplyOutcome::AlreadyApplied);
        }
        if self.state.applied_by_session {
            warn!("restriction {key} drifted to {observed:?} after this session applied it");
        }

        self.ensure_key()?;
        self.check_write_access()?;

        self.store
            .write_dword(key.hive, key.path, key.value_name, desired)
            .map_err(|err| self.error(RestrictionErrorKind::WriteFailed, err))?;

        match self.read() {
            Ok(Some(value)) if value == desired => {}
            Ok(readback) => {
                self.rollback(observed);
                return Err(RestrictionError::new(
                    RestrictionErrorKind::VerifyMismatch,
                    format!("{key}: wrote {desired} but read back {readback:?}"),
                ));
            }
            Err(err) => {
                self.rollback(observed);
                return Err(RestrictionError::new(
                    RestrictionErrorKind::VerifyMismatch,
                    format!("{key}: wrote {desired} but the read-back failed: {err}"),
                ));
            }
        }

        if !self.state.applied_by_session {
            self.state.prior_value = observed;
        }
        self.state.applied_by_session = true;
        info!("restriction {key} applied and verified (previous value {observed:?})");
        Ok(ApplyOutcome::Applied)
    }

    /// Undo what [`apply`](Self::apply) did in this session.
    ///
    /// No-op unless this session applied the restriction. A value changed by
    /// someone else since apply is left in place.
    pub fn revert(&mut self) -> Result<(), RestrictionError> {
        let key = self.state.key;
        if !self.state.applied_by_session {
            debug!("restriction {key} not applied by this session; revert skipped");
            return Ok(());
        }

        let current = self
            .read()
            .map_err(|err| self.error(RestrictionErrorKind::RevertFailed, err))?;
        if current != Some(self.state.desired_value) {
            warn!(
                "restriction {key} changed externally to {current:?}; not reverting a value this session no longer owns"
            );
            self.state.applied_by_session = false;
            return Ok(());
        }

        let prior = self.state.prior_value;
        self.restore(prior)
            .map_err(|err| self.error(RestrictionErrorKind::RevertFailed, err))?;

        let readback = self
            .read()
            .map_err(|err| self.error(RestrictionErrorKind::RevertFailed, err))?;
        if readback != prior {
            return Err(RestrictionError::new(
                RestrictionErrorKind::RevertFailed,
                format!("{key}: expected {prior:?} after revert, read back {readback:?}"),
            ));
        }

        self.state.applied_by_session = false;
        info!("restriction {key} reverted to {prior:?}");
        Ok(())
    }

    fn ensure_key(&mut self) -> Result<(), RestrictionError> {
        let key = self.state.key;
        let exists = self
            .store
            .key_exists(key.hive, key.path)
            .map_err(|err| self.error(RestrictionErrorKind::PathCreateFailed, err))?;
        if exists {
            return Ok(());
        }

        self.store
            .create_key(key.hive, key.path)
            .map_err(|err| self.error(RestrictionErrorKind::PathCreateFailed, err))?;
        self.state.created_key = true;
        debug!("created registry key {}\\{}", key.hive, key.path);
        Ok(())
    }

    fn check_write_access(&self) -> Result<(), RestrictionError> {
        let key = self.state.key;
        self.store
            .write_dword(key.hive, key.path, SCRATCH_VALUE_NAME, SCRATCH_MARKER)
            .map_err(|err| self.error(RestrictionErrorKind::WriteProbeFailed, err))?;
        self.store
            .delete_value(key.hive, key.path, SCRATCH_VALUE_NAME)
            .map_err(|err| {
                self.error(
                    RestrictionErrorKind::WriteProbeFailed,
                    format!("scratch value {SCRATCH_VALUE_NAME} could not be removed: {err}"),
                )
            })
    }

    /// Restore `prior` after a failed verification. The session no longer owns
    /// the value afterwards, whatever the outcome.
    fn rollback(&mut self, prior: Option<u32>) {
        let key = self.state.key;
        self.state.applied_by_session = false;
        match self.restore(prior) {
            Ok(()) => debug!("rolled {key} back to {prior:?} after failed verification"),
            Err(err) => warn!("failed to roll {key} back to {prior:?}: {err}"),
        }
    }

    fn restore(&self, value: Option<u32>) -> Result<(), StoreError> {
        let key = self.state.key;
        match value {
            Some(value) => self
                .store
                .write_dword(key.hive, key.path, key.value_name, value),
            None => self.store.delete_value(key.hive, key.path, key.value_name),
        }
    }

    fn read(&self) -> Result<Option<u32>, StoreError> {
        let key = self.state.key;
        self.store.read_dword(key.hive, key.path, key.value_name)
    }

    fn error(&self, kind: RestrictionErrorKind, cause: impl std::fmt::Display) -> RestrictionError {
        RestrictionError::new(kind, format!("{}: {cause}", self.state.key))
    }
}

/// Break-glass removal of the restriction regardless of which process set it.
///
/// Returns `Ok(true)` when the sentinel was present and has been removed, and
/// `Ok(false)` when there was nothing to release.
pub fn release<S>(store: &S, key: RegistryKey, desired_value: u32) -> Result<bool, RestrictionError>
where
    S: RegistryStore,
{
    let fail = |kind: RestrictionErrorKind, err: StoreError| {
        RestrictionError::new(kind, format!("{key}: {err}"))
    };

    let current = store
        .read_dword(key.hive, key.path, key.value_name)
        .map_err(|err| fail(RestrictionErrorKind::ReadFailed, err))?;
    if current != Some(desired_value) {
        info!("restriction {key} is not set (value {current:?}); nothing to release");
        return Ok(false);
    }

    store
        .delete_value(key.hive, key.path, key.value_name)
        .map_err(|err| fail(RestrictionErrorKind::RevertFailed, err))?;
    let readback = store
        .read_dword(key.hive, key.path, key.value_name)
        .map_err(|err| fail(RestrictionErrorKind::RevertFailed, err))?;
    if readback.is_some() {
        return Err(RestrictionError::new(
            RestrictionErrorKind::RevertFailed,
            format!("{key}: value still reads {readback:?} after delete"),
        ));
    }

    warn!("restriction {key} released manually");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curfew_provider::{MemoryStore, StoredValue};
    use std::sync::{Arc, Mutex};

    /// Accepts writes to the restriction value but keeps serving the old value.
    #[derive(Clone, Default)]
    struct StaleStore {
        inner: MemoryStore,
        dropped_writes: Arc<Mutex<u32>>,
    }

    impl RegistryStore for StaleStore {
        fn key_exists(&self, hive: Hive, path: &str) -> Result<bool, StoreError> {
            self.inner.key_exists(hive, path)
        }

        fn create_key(&self, hive: Hive, path: &str) -> Result<(), StoreError> {
            self.inner.create_key(hive, path)
        }

        fn read_dword(
            &self,
            hive: Hive,
            path: &str,
            name: &str,
        ) -> Result<Option<u32>, StoreError> {
            self.inner.read_dword(hive, path, name)
        }

        fn write_dword(
            &self,
            hive: Hive,
            path: &str,
            name: &str,
            value: u32,
        ) -> Result<(), StoreError> {
            if name == TASK_MANAGER_KEY.value_name {
                *self.dropped_writes.lock().unwrap() += 1;
                return Ok(());
            }
            self.inner.write_dword(hive, path, name, value)
        }

        fn delete_value(&self, hive: Hive, path: &str, name: &str) -> Result<(), StoreError> {
            self.inner.delete_value(hive, path, name)
        }
    }

    #[derive(Clone, Copy, Default)]
    struct Faults {
        refuse_scratch_write: bool,
        refuse_scratch_delete: bool,
        fail_read_after_write: bool,
    }

    /// Memory store that refuses selected operations.
    #[derive(Clone, Default)]
    struct FaultyStore {
        inner: MemoryStore,
        faults: Arc<Mutex<Faults>>,
        restriction_written: Arc<Mutex<bool>>,
    }

    impl FaultyStore {
        fn new(inner: MemoryStore, faults: Faults) -> Self {
            Self {
                inner,
                faults: Arc::new(Mutex::new(faults)),
                restriction_written: Arc::default(),
            }
        }

        fn set_faults(&self, faults: Faults) {
            *self.faults.lock().unwrap() = faults;
            *self.restriction_written.lock().unwrap() = false;
        }

        fn faults(&self) -> Faults {
            *self.faults.lock().unwrap()
        }
    }

    impl RegistryStore for FaultyStore {
        fn key_exists(&self, hive: Hive, path: &str) -> Result<bool, StoreError> {
            self.inner.key_exists(hive, path)
        }

        fn create_key(&self, hive: Hive, path: &str) -> Result<(), StoreError> {
            self.inner.create_key(hive, path)
        }

        fn read_dword(
            &self,
            hive: Hive,
            path: &str,
            name: &str,
        ) -> Result<Option<u32>, StoreError> {
            if self.faults().fail_read_after_write && *self.restriction_written.lock().unwrap() {
                return Err(StoreError::Os {
                    target: name.to_string(),
                    code: 1117,
                });
            }
            self.inner.read_dword(hive, path, name)
        }

        fn write_dword(
            &self,
            hive: Hive,
            path: &str,
            name: &str,
            value: u32,
        ) -> Result<(), StoreError> {
            if name == SCRATCH_VALUE_NAME && self.faults().refuse_scratch_write {
                return Err(StoreError::AccessDenied(name.to_string()));
            }
            self.inner.write_dword(hive, path, name, value)?;
            if name == TASK_MANAGER_KEY.value_name {
                *self.restriction_written.lock().unwrap() = true;
            }
            Ok(())
        }

        fn delete_value(&self, hive: Hive, path: &str, name: &str) -> Result<(), StoreError> {
            if name == SCRATCH_VALUE_NAME && self.faults().refuse_scratch_delete {
                return Err(StoreError::AccessDenied(name.to_string()));
            }
            self.inner.delete_value(hive, path, name)
        }
    }

    #[test]
    fn apply_creates_key_and_verifies_value() {
        let store = MemoryStore::new();
        let mut controller = RestrictionController::new(store.clone());

        assert_eq!(controller.apply().unwrap(), ApplyOutcome::Applied);
        assert!(controller.applied_by_session());
        assert!(controller.state().created_key);
        assert_eq!(controller.state().prior_value, None);
        assert_eq!(
            store.value(TASK_MANAGER_KEY),
            Some(StoredValue::Dword(RESTRICTED_VALUE))
        );
        assert!(!store
            .value_names(TASK_MANAGER_KEY.hive, TASK_MANAGER_KEY.path)
            .iter()
            .any(|name| name.eq_ignore_ascii_case(SCRATCH_VALUE_NAME)));
    }

    #[test]
    fn apply_is_idempotent_when_already_restricted() {
        let store = MemoryStore::new().with_dword(TASK_MANAGER_KEY, RESTRICTED_VALUE);
        let mut controller = RestrictionController::new(store.clone());

        assert_eq!(controller.apply().unwrap(), ApplyOutcome::AlreadyApplied);
        assert_eq!(controller.apply().unwrap(), ApplyOutcome::AlreadyApplied);
        assert!(!controller.applied_by_session());
        assert_eq!(
            store.value_names(TASK_MANAGER_KEY.hive, TASK_MANAGER_KEY.path),
            vec!["disabletaskmgr".to_string()]
        );
    }

    #[test]
    fn reapply_after_own_apply_keeps_ownership() {
        let mut controller = RestrictionController::new(MemoryStore::new());
        assert_eq!(controller.apply().unwrap(), ApplyOutcome::Applied);
        assert_eq!(controller.apply().unwrap(), ApplyOutcome::AlreadyApplied);
        assert!(controller.applied_by_session());
    }

    #[test]
    fn silently_dropped_write_is_a_verify_mismatch() {
        let store = MemoryStore::new().with_dword(TASK_MANAGER_KEY, 0);
        let stale = StaleStore {
            inner: store.clone(),
            dropped_writes: Arc::new(Mutex::new(0)),
        };
        let mut controller = RestrictionController::new(stale.clone());

        let err = controller.apply().unwrap_err();
        assert_eq!(err.kind, RestrictionErrorKind::VerifyMismatch);
        assert!(!controller.applied_by_session());
        // the write itself plus the rollback to 0
        assert_eq!(*stale.dropped_writes.lock().unwrap(), 2);
        assert_eq!(store.value(TASK_MANAGER_KEY), Some(StoredValue::Dword(0)));
    }

    #[test]
    fn refused_write_permission_check_is_reported() {
        let store = MemoryStore::new().with_dword(TASK_MANAGER_KEY, 0);
        let faulty = FaultyStore::new(
            store.clone(),
            Faults {
                refuse_scratch_write: true,
                ..Faults::default()
            },
        );
        let mut controller = RestrictionController::new(faulty);

        let err = controller.apply().unwrap_err();
        assert_eq!(err.kind, RestrictionErrorKind::WriteProbeFailed);
        assert!(!controller.applied_by_session());
        assert_eq!(store.value(TASK_MANAGER_KEY), Some(StoredValue::Dword(0)));
    }

    #[test]
    fn undeletable_scratch_marker_is_reported() {
        let store = MemoryStore::new().with_dword(TASK_MANAGER_KEY, 0);
        let faulty = FaultyStore::new(
            store.clone(),
            Faults {
                refuse_scratch_delete: true,
                ..Faults::default()
            },
        );
        let mut controller = RestrictionController::new(faulty);

        let err = controller.apply().unwrap_err();
        assert_eq!(err.kind, RestrictionErrorKind::WriteProbeFailed);
        assert!(err.to_string().contains(SCRATCH_VALUE_NAME));
        assert!(!controller.applied_by_session());
        assert_eq!(store.value(TASK_MANAGER_KEY), Some(StoredValue::Dword(0)));
    }

    #[test]
    fn failed_read_back_rolls_back() {
        let store = MemoryStore::new().with_dword(TASK_MANAGER_KEY, 0);
        let faulty = FaultyStore::new(
            store.clone(),
            Faults {
                fail_read_after_write: true,
                ..Faults::default()
            },
        );
        let mut controller = RestrictionController::new(faulty);

        let err = controller.apply().unwrap_err();
        assert_eq!(err.kind, RestrictionErrorKind::VerifyMismatch);
        assert!(err.to_string().contains("read-back failed"));
        assert!(!controller.applied_by_session());
        assert_eq!(store.value(TASK_MANAGER_KEY), Some(StoredValue::Dword(0)));
    }

    #[test]
    fn failed_reapply_after_drift_gives_up_ownership() {
        let store = MemoryStore::new();
        let faulty = FaultyStore::new(store.clone(), Faults::default());
        let mut controller = RestrictionController::new(faulty.clone());
        assert_eq!(controller.apply().unwrap(), ApplyOutcome::Applied);

        store.insert(
            TASK_MANAGER_KEY.hive,
            TASK_MANAGER_KEY.path,
            TASK_MANAGER_KEY.value_name,
            StoredValue::Dword(0),
        );
        faulty.set_faults(Faults {
            fail_read_after_write: true,
            ..Faults::default()
        });

        let err = controller.apply().unwrap_err();
        assert_eq!(err.kind, RestrictionErrorKind::VerifyMismatch);
        assert!(!controller.applied_by_session());
        assert_eq!(store.value(TASK_MANAGER_KEY), Some(StoredValue::Dword(0)));

        // Nothing is owned any more, so revert must not touch the drifted value.
        faulty.set_faults(Faults::default());
        controller.revert().unwrap();
        assert_eq!(store.value(TASK_MANAGER_KEY), Some(StoredValue::Dword(0)));
    }

    #[test]
    fn non_dword_value_fails_the_initial_read() {
        let store = MemoryStore::new();
        store.insert(
            TASK_MANAGER_KEY.hive,
            TASK_MANAGER_KEY.path,
            TASK_MANAGER_KEY.value_name,
            StoredValue::Text("1".into()),
        );
        let mut controller = RestrictionController::new(store);
        let err = controller.apply().unwrap_err();
        assert_eq!(err.kind, RestrictionErrorKind::ReadFailed);
    }

    #[test]
    fn revert_restores_prior_value() {
        let store = MemoryStore::new().with_dword(TASK_MANAGER_KEY, 0);
        let mut controller = RestrictionController::new(store.clone());
        controller.apply().unwrap();
        assert_eq!(controller.state().prior_value, Some(0));

        controller.revert().unwrap();
        assert!(!controller.applied_by_session());
        assert_eq!(store.value(TASK_MANAGER_KEY), Some(StoredValue::Dword(0)));
    }

    #[test]
    fn revert_deletes_value_that_did_not_exist() {
        let store = MemoryStore::new();
        let mut controller = RestrictionController::new(store.clone());
        controller.apply().unwrap();
        controller.revert().unwrap();
        assert_eq!(store.value(TASK_MANAGER_KEY), None);
        controller.revert().unwrap();
    }

    #[test]
    fn revert_leaves_pre_existing_restriction() {
        let store = MemoryStore::new().with_dword(TASK_MANAGER_KEY, RESTRICTED_VALUE);
        let mut controller = RestrictionController::new(store.clone());
        controller.apply().unwrap();
        controller.revert().unwrap();
        assert_eq!(
            store.value(TASK_MANAGER_KEY),
            Some(StoredValue::Dword(RESTRICTED_VALUE))
        );
    }

    #[test]
    fn revert_skips_externally_changed_value() {
        let store = MemoryStore::new();
        let mut controller = RestrictionController::new(store.clone());
        controller.apply().unwrap();
        store.insert(
            TASK_MANAGER_KEY.hive,
            TASK_MANAGER_KEY.path,
            TASK_MANAGER_KEY.value_name,
            StoredValue::Dword(5),
        );

        controller.revert().unwrap();
        assert!(!controller.applied_by_session());
        assert_eq!(store.value(TASK_MANAGER_KEY), Some(StoredValue::Dword(5)));
    }

    #[test]
    fn release_removes_sentinel_only() {
        let store = MemoryStore::new().with_dword(TASK_MANAGER_KEY, RESTRICTED_VALUE);
        assert!(release(&store, TASK_MANAGER_KEY, RESTRICTED_VALUE).unwrap());
        assert_eq!(store.value(TASK_MANAGER_KEY), None);
        assert!(!release(&store, TASK_MANAGER_KEY, RESTRICTED_VALUE).unwrap());

        let other = MemoryStore::new().with_dword(TASK_MANAGER_KEY, 0);
        assert!(!release(&other, TASK_MANAGER_KEY, RESTRICTED_VALUE).unwrap());
        assert_eq!(other.value(TASK_MANAGER_KEY), Some(StoredValue::Dword(0)));
    }
}
