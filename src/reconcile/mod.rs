pub mod election;
pub mod ledger;
pub mod slash;

pub use election::{RefundLedger, TransitionReport, calculate_refund};
pub use ledger::{LedgerCheck, LedgerSummary, check_reserved, compute_deposits};
pub use slash::detect_slash;
