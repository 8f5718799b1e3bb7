use curfew_core::config::CurfewConfig;
use curfew_core::error::{FatalSessionError, ProjectionError, RestrictionErrorKind};
use curfew_core::{
    EnforcementSession, InputMatcher, MatchTier, Projection, RestrictionController,
    SessionOutcome, SessionState, RESTRICTED_VALUE, TASK_MANAGER_KEY,
};
use curfew_provider::{Hive, MemoryStore, RegistryStore, StoreError, StoredValue};
use std::sync::{Arc, Mutex};

#[test]
fn typing_cat_progresses_and_exits_zero() {
    let store = MemoryStore::new();
    let screen = SharedScreen::default();
    let mut session = session(store.clone(), "cat", screen.clone());

    session.start().expect("restriction should apply");
    assert_eq!(
        store.value(TASK_MANAGER_KEY),
        Some(StoredValue::Dword(RESTRICTED_VALUE))
    );

    session.on_input_changed("c");
    assert_eq!(screen.last(), Some((33, MatchTier::Far)));
    session.on_input_changed("ca");
    assert_eq!(screen.last(), Some((67, MatchTier::Far)));
    session.on_input_changed("cat");
    assert_eq!(screen.last(), Some((100, MatchTier::Complete)));

    assert!(screen.unblocked());
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(session.exit_code(), 0);
    assert_eq!(store.value(TASK_MANAGER_KEY), None);
}

#[test]
fn missing_key_path_that_cannot_be_created_is_fatal() {
    let screen = SharedScreen::default();
    let mut session = session(NoCreateStore::default(), "cat", screen.clone());

    match session.start() {
        Err(FatalSessionError::Restriction(err)) => {
            assert_eq!(err.kind, RestrictionErrorKind::PathCreateFailed)
        }
        other => panic!("unexpected start result: {other:?}"),
    }

    assert!(!session.history().contains(&SessionState::Waiting));
    assert_eq!(session.outcome(), SessionOutcome::AbortedRestrictionFailed);
    assert_eq!(session.exit_code(), 1);
    let fatal = screen.fatal().expect("fatal error should be shown");
    assert!(fatal.contains("key creation failed"), "{fatal}");
    assert!(screen.last().is_none());
}

#[test]
fn mistyped_first_character_scores_two_thirds() {
    let screen = SharedScreen::default();
    let mut session = session(MemoryStore::new(), "cat", screen.clone());
    session.start().unwrap();

    assert_eq!(session.on_input_changed("xat"), SessionState::Waiting);
    let state = session.match_state();
    assert!((state.match_ratio - 2.0 / 3.0).abs() < 1e-9);
    assert!(!state.satisfied);
    assert_eq!(screen.last(), Some((67, MatchTier::Far)));
}

#[test]
fn prior_value_is_restored_after_release() {
    let store = MemoryStore::new().with_dword(TASK_MANAGER_KEY, 0);
    let mut session = session(store.clone(), "cat", SharedScreen::default());

    session.start().unwrap();
    assert_eq!(
        store.value(TASK_MANAGER_KEY),
        Some(StoredValue::Dword(RESTRICTED_VALUE))
    );
    session.on_input_changed("cat");
    assert_eq!(store.value(TASK_MANAGER_KEY), Some(StoredValue::Dword(0)));
}

#[test]
fn external_change_during_session_is_not_overwritten() {
    let store = MemoryStore::new();
    let mut session = session(store.clone(), "cat", SharedScreen::default());
    session.start().unwrap();

    store.insert(
        TASK_MANAGER_KEY.hive,
        TASK_MANAGER_KEY.path,
        TASK_MANAGER_KEY.value_name,
        StoredValue::Dword(7),
    );
    session.on_input_changed("cat");
    assert_eq!(store.value(TASK_MANAGER_KEY), Some(StoredValue::Dword(7)));
}

#[test]
fn default_sentence_drives_a_session() {
    let config = CurfewConfig::default();
    let screen = SharedScreen::default();
    let mut session = session(
        MemoryStore::new(),
        &config.commitment.sentence,
        screen.clone(),
    );
    session.start().unwrap();

    // Trailing newline and a tab are stripped before scoring.
    let typed = format!("{}\n", config.commitment.sentence.replace(' ', " \t"));
    assert_eq!(session.on_input_changed(&typed), SessionState::Terminated);
    assert_eq!(session.exit_code(), 0);
}

fn session<S: RegistryStore>(
    store: S,
    target: &str,
    screen: SharedScreen,
) -> EnforcementSession<S, SharedScreen> {
    EnforcementSession::new(
        RestrictionController::new(store),
        InputMatcher::new(target).expect("target should be valid"),
        screen,
    )
}

#[derive(Clone, Default)]
struct SharedScreen {
    inner: Arc<Mutex<Screen>>,
}

#[derive(Default)]
struct Screen {
    readouts: Vec<(u8, MatchTier)>,
    fatal: Option<String>,
    unblocked: bool,
}

impl SharedScreen {
    fn last(&self) -> Option<(u8, MatchTier)> {
        self.inner.lock().unwrap().readouts.last().copied()
    }

    fn fatal(&self) -> Option<String> {
        self.inner.lock().unwrap().fatal.clone()
    }

    fn unblocked(&self) -> bool {
        self.inner.lock().unwrap().unblocked
    }
}

impl Projection for SharedScreen {
    fn set_match_display(
        &mut self,
        percent: u8,
        tier: MatchTier,
        _text: &str,
    ) -> Result<(), ProjectionError> {
        self.inner.lock().unwrap().readouts.push((percent, tier));
        Ok(())
    }

    fn set_border_emphasis(&mut self, _tier: MatchTier) -> Result<(), ProjectionError> {
        Ok(())
    }

    fn show_fatal_error(&mut self, message: &str) -> Result<(), ProjectionError> {
        self.inner.lock().unwrap().fatal = Some(message.to_string());
        Ok(())
    }

    fn unblock(&mut self) -> Result<(), ProjectionError> {
        self.inner.lock().unwrap().unblocked = true;
        Ok(())
    }
}

/// Store without the policy key that refuses to create it.
#[derive(Clone, Default)]
struct NoCreateStore {
    inner: MemoryStore,
}

impl RegistryStore for NoCreateStore {
    fn key_exists(&self, hive: Hive, path: &str) -> Result<bool, StoreError> {
        self.inner.key_exists(hive, path)
    }

    fn create_key(&self, hive: Hive, path: &str) -> Result<(), StoreError> {
        Err(StoreError::AccessDenied(format!("{hive}\\{path}")))
    }

    fn read_dword(&self, hive: Hive, path: &str, name: &str) -> Result<Option<u32>, StoreError> {
        self.inner.read_dword(hive, path, name)
    }

    fn write_dword(
        &self,
        hive: Hive,
        path: &str,
        name: &str,
        value: u32,
    ) -> Result<(), StoreError> {
        self.inner.write_dword(hive, path, name, value)
    }

    fn delete_value(&self, hive: Hive, path: &str, name: &str) -> Result<(), StoreError> {
        self.inner.delete_value(hive, path, name)
    }
}
