pub mod challenge;
pub mod encounter;
pub mod events;
pub mod hunts;
pub mod modifiers;
pub mod resolver;
pub mod rewards;
pub mod selector;

use std::fmt;

/// Errors local to one encounter. None of these are fatal to the process; the
/// caller reports them and waits for the player to cast again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncounterError {
    /// The pool produced an empty weighted set even after falling back to the
    /// unfiltered population.
    NoEligibleCandidate,
    /// The background key listener could not be started.
    InputCaptureUnavailable(String),
    /// The player aborted mid-resolution. Never grants partial reward.
    CancelledByPlayer,
}

impl fmt::Display for EncounterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncounterError::NoEligibleCandidate => {
                write!(f, "nothing to catch here with the current setup")
            }
            EncounterError::InputCaptureUnavailable(reason) => {
                write!(f, "key capture unavailable: {reason}")
            }
            EncounterError::CancelledByPlayer => write!(f, "encounter cancelled by player"),
        }
    }
}

impl std::error::Error for EncounterError {}
