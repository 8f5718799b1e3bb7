//! Enforcement session: restrict, wait for the commitment, release, clean up.
//!
//! The session owns the restriction controller, the matcher, the last known-good
//! match state, and the projection it renders into. Nothing else mutates them.
//!
//! Restricting is fail-closed: if the restriction cannot be verified the session
//! never reaches `Waiting`. Waiting is fail-soft: a bad input event or a failing
//! projection callback is logged and the session keeps waiting. Cleanup runs
//! exactly once on every path, including drop.

use crate::error::{FatalSessionError, ProjectionError};
use crate::matcher::{CharMark, InputMatcher, MatchState, MatchTier};
use crate::restriction::{ApplyOutcome, RestrictionController};
use curfew_provider::RegistryStore;
use log::{debug, error, info, warn};


/// Lifecycle position of an [`EnforcementSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Restricting,
    Waiting,
    Satisfied,
    Cleanup,
    Terminated,
}

/// How the session ended (or `Blocked` while it is still running).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Blocked,
    Satisfied,
    AbortedRestrictionFailed,
    AbortedFatalError,
}

impl SessionOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            SessionOutcome::Satisfied => 0,
            SessionOutcome::Blocked
            | SessionOutcome::AbortedRestrictionFailed
            | SessionOutcome::AbortedFatalError => 1,
        }
    }
}

/// Presentation surface driven by the session.
///
/// Implementations hold display copies only; errors are logged by the session
/// and never end it.
pub trait Projection {
    fn set_match_display(
        &mut self,
        percent: u8,
        tier: MatchTier,
        text: &str,
    ) -> Result<(), ProjectionError>;

    fn set_border_emphasis(&mut self, tier: MatchTier) -> Result<(), ProjectionError>;

    /// Per-character correctness of the current input. Optional for projections
    /// that only show the percentage.
    fn set_character_marks(&mut self, _marks: &[CharMark]) -> Result<(), ProjectionError> {
        Ok(())
    }

    fn show_fatal_error(&mut self, message: &str) -> Result<(), ProjectionError>;

    fn unblock(&mut self) -> Result<(), ProjectionError>;
}

pub struct EnforcementSession<S, P>
where
    S: RegistryStore,
    P: Projection,
{
    controller: RestrictionController<S>,
    matcher: InputMatcher,
    match_state: MatchState,
    projection: P,
    state: SessionState,
    outcome: SessionOutcome,
    history: Vec<SessionState>,
}

impl<S, P> EnforcementSession<S, P>
where
    S: RegistryStore,
    P: Projection,
{
    pub fn new(controller: RestrictionController<S>, matcher: InputMatcher, projection: P) -> Self {
        let match_state = matcher.initial_state();
        Self {
            controller,
            matcher,
            match_state,
            projection,
            state: SessionState::Init,
            outcome: SessionOutcome::Blocked,
            history: vec![SessionState::Init],
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn outcome(&self) -> SessionOutcome {
        self.outcome
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }

    /// Every state entered so far, starting with `Init`.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn match_state(&self) -> &MatchState {
        &self.match_state
    }

    pub fn target(&self) -> &str {
        self.matcher.target()
    }

    pub fn controller(&self) -> &RestrictionController<S> {
        &self.controller
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn projection_mut(&mut self) -> &mut P {
        &mut self.projection
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    /// Apply the restriction and enter `Waiting`.
    ///
    /// Returns only after the restriction has been read back. On failure the
    /// operator is shown a fatal error, cleanup runs, and the session ends with
    /// `AbortedRestrictionFailed`.
    pub fn start(&mut self) -> Result<ApplyOutcome, FatalSessionError> {
        if self.state != SessionState::Init {
            return Err(FatalSessionError::Aborted(format!(
                "session cannot start from {:?}",
                self.state
            )));
        }

        self.transition(SessionState::Restricting);
        match self.controller.apply() {
            Ok(applied) => {
                info!("restriction ready ({applied:?}); waiting for the commitment");
                self.transition(SessionState::Waiting);
                self.render();
                Ok(applied)
            }
            Err(err) => {
                error!("restriction could not be applied: {err}");
                let message = format!(
                    "Curfew could not disable the task manager, so the session cannot start.\n\n{err}"
                );
                if let Err(projection_err) = self.projection.show_fatal_error(&message) {
                    error!("fatal error could not be shown: {projection_err}");
                }
                self.terminate(SessionOutcome::AbortedRestrictionFailed);
                Err(FatalSessionError::Restriction(err))
            }
        }
    }

    /// Handle one input-change notification from the projection.
    ///
    /// Events outside `Waiting` are ignored. Returns the state after handling.
    pub fn on_input_changed(&mut self, raw: &str) -> SessionState {
        if self.state != SessionState::Waiting {
            debug!("input event ignored in state {:?}", self.state);
            return self.state;
        }

        match self.matcher.evaluate(raw) {
            Ok(next) => self.match_state = next,
            Err(err) => {
                warn!("input event discarded: {err}");
                self.render();
                return self.state;
            }
        }
        self.render();

        if self.match_state.satisfied {
            info!("commitment typed in full; releasing the session");
            self.transition(SessionState::Satisfied);
            if let Err(err) = self.projection.unblock() {
                warn!("projection failed to unblock: {err}");
            }
            self.terminate(SessionOutcome::Satisfied);
        }
        self.state
    }

    /// End the session from any state with `AbortedFatalError`.
    ///
    /// Used for termination signals and unhandled errors around the session. A
    /// session that already terminated is left as is.
    pub fn abort(&mut self, reason: &str) {
        if self.is_terminated() {
            debug!("abort ({reason}) after termination ignored");
            return;
        }
        error!("session aborted: {reason}");
        self.terminate(SessionOutcome::AbortedFatalError);
    }

    fn render(&mut self) {
        let percent = self.match_state.percent();
        let tier = self.match_state.tier();

        if let Err(err) =
            self.projection
                .set_match_display(percent, tier, &self.match_state.sanitized_input)
        {
            warn!("{err}");
        }
        if let Err(err) = self.projection.set_character_marks(&self.match_state.marks) {
            warn!("{err}");
        }
        if let Err(err) = self.projection.set_border_emphasis(tier) {
            warn!("{err}");
        }
    }

    fn terminate(&mut self, outcome: SessionOutcome) {
        if matches!(self.state, SessionState::Cleanup | SessionState::Terminated) {
            return;
        }
        self.outcome = outcome;
        self.transition(SessionState::Cleanup);

        if self.controller.applied_by_session() {
            if let Err(err) = self.controller.revert() {
                error!("restriction revert failed during cleanup: {err}");
            }
        } else {
            debug!("cleanup: restriction not owned by this session");
        }

        self.transition(SessionState::Terminated);
        info!("session terminated with outcome {outcome:?}");
    }

    fn transition(&mut self, next: SessionState) {
        debug!("session {:?} -> {next:?}", self.state);
        self.state = next;
        self.history.push(next);
    }
}

impl<S, P> Drop for EnforcementSession<S, P>
where
    S: RegistryStore,
    P: Projection,
{
    fn drop(&mut self) {
        if !self.is_terminated() {
            warn!("session dropped in state {:?}; running cleanup", self.state);
            self.terminate(SessionOutcome::AbortedFatalError);
        }
    }
}
