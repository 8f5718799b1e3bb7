//! Core building blocks shared by Curfew binaries.
//!
//! The restriction controller, input matcher, and enforcement session live here so
//! the CLI and the blocking window only have to implement a `Projection`.

pub mod config;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod restriction;
pub mod session;
pub mod shutdown;

pub use config::{CommitmentCfg, ConfigFormat, CurfewConfig, LoggingCfg, UiCfg};
pub use error::{
    CurfewError, CurfewResult, FatalSessionError, InputError, ProjectionError, RestrictionError,
    RestrictionErrorKind,
};
pub use matcher::{CharMark, InputMatcher, MatchState, MatchTier, Score};
pub use restriction::{
    ApplyOutcome, RestrictionController, RestrictionState, RESTRICTED_VALUE, TASK_MANAGER_KEY,
};
pub use session::{EnforcementSession, Projection, SessionOutcome, SessionState};
