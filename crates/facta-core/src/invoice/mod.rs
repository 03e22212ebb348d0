//! Invoice field extraction module.

mod orchestrator;
pub mod reconcile;
pub mod rules;
mod strategy;
mod travel;

pub use orchestrator::{deduplicate, CascadeState, ExtractionOrchestrator, SourceDocument};
pub use reconcile::{Reconciled, ReconcileInput, Reconciler};
pub use rules::kind::DocumentKind;
pub use strategy::{scan_total, ExtractionStrategy, RuleStrategy};
pub use travel::TravelExtractor;
