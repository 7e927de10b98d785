#![deny(warnings)]

//! Projection runtime: herd generation, the monthly ledger, yearly rollups,
//! break-even detection, named report views and YAML scenarios.
//!
//! A run is a pure function of [`SimParams`](herd_core::SimParams) and an
//! [`EngineConfig`]; the resulting [`Projection`] is immutable and can be
//! re-queried under other views with [`report_for`].

pub mod herd;
pub mod ledger;
pub mod projection;
pub mod report;
pub mod scenario;

pub use herd::{founder_label, generate_herd, offspring_id, FOUNDERS_PER_UNIT};
pub use ledger::{LedgerRow, MonthCell, MonthlyLedger};
pub use projection::{
    run_projection, AnimalTotals, BreakEven, EngineConfig, EngineError, GroupSummary,
    MonthTotals, Projection, RecoveryTier, YearSummary, YearValuation,
};
pub use report::{report_for, Report};
pub use scenario::ScenarioFile;
