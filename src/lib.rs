//! Maintenance toolkit for the heretical-game question bank.
//!
//! The bank is a single JSON document with three difficulty lists plus a
//! couple of auxiliary collections the game reads directly. Everything in
//! here either transforms an in-memory [`QuestionSet`] or moves one safely
//! between memory and disk.
//!
//! ```rust,no_run
//! use catechist::{bank, TimerDefaults};
//!
//! fn main() -> Result<(), catechist::BankError> {
//!     let filled = bank::update("questions.json".as_ref(), |set| {
//!         Ok(set.fill_time_limits(&TimerDefaults::default()))
//!     })?;
//!     println!("filled {filled} timers");
//!     Ok(())
//! }
//! ```

pub mod bank;
pub mod question;
pub mod rewrite;
pub mod serve;

pub use bank::{BankError, BankLock};
pub use question::{Difficulty, MergeReport, Question, QuestionSet, TimerDefaults, Violation};
