// Flat/held transition rules
pub mod rules;

pub use rules::{
    evaluate_entry, evaluate_exit, EntryDecision, ExitDecision, ExitReason, RuleConfig,
    SkipReason, MIN_ENTRY_HISTORY,
};
