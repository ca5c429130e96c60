//! Error types for timeslot operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimeslotError {
    /// An interval, time-of-day range or date range whose end is not after its
    /// start, or whose components are out of bounds.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Cannot union disjoint intervals")]
    DisjointUnion,

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    /// The iCalendar input was malformed. `line` is 1-based.
    #[error("Invalid iCalendar data at line {line}: {message}")]
    InvalidIcs { line: usize, message: String },

    #[error("Cannot book in the past")]
    PastBooking,

    #[error("Insufficient booking notice")]
    InsufficientNotice,

    #[error("Booking too far in advance")]
    TooFarInAdvance,

    #[error("Slot not available")]
    SlotUnavailable,

    #[error("Booking not found")]
    BookingNotFound,

    #[error("Unknown resolution strategy: {0}")]
    UnknownResolutionStrategy(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TimeslotError>;
