use thiserror::Error;

/// Everything that can go wrong inside the trainer core. Generator and pitch
/// errors are handled by the immediate caller; scheduling and device errors
/// stop the current practice session but never the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("pitch outside the MIDI range 0..=127: {0}")]
    InvalidPitch(i16),
    #[error("unreadable pitch spelling: {0}")]
    UnparseablePitch(String),
    #[error("malformed score markup at token {token}: {reason}")]
    ScoreLoad { token: usize, reason: String },
    #[error("MIDI input unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("scheduled action targets a score position that no longer exists ({0})")]
    ScheduleOverrun(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
