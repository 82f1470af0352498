//! Writers for analysis results

pub mod xtiming;
