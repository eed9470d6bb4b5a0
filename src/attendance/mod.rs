//! Attendance register: marks keyed by (student, subject, calendar day),
//! scoped by branch and semester.
//!
//! Writes go through `recorder`; `roster` and `summary` only read.

pub mod day;
pub mod directory;
mod error;
pub mod gate;
pub mod model;
pub mod recorder;
pub mod roster;
mod store;
pub mod summary;

pub use error::{AttendanceError, Result};
