//! Master Controller (spec.md §4.H).

pub mod controller;
pub mod options;
pub mod outcome;

pub use controller::MasterController;
pub use options::RunOptions;
pub use outcome::RunOutcome;
