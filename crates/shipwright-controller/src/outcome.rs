//! What a run produced, as seen by the caller of [`crate::controller::MasterController`].

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Shipped,
    Aborted { stage: String, reason: String },
}
