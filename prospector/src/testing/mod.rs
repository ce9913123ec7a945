//! Test support: mock collectors, processors, and record fixtures.
//!
//! These are real implementations of the crate's seams, small enough to
//! reason about exactly, used by the crate's own tests and available to
//! downstream crates testing against the pipeline.

mod fixtures;
mod mocks;

pub use fixtures::{raw_row, CompanyRecord, CompanyRowParser};
pub use mocks::{
    CountingProcessor, FailEveryNthProcessor, FailingCollector, FlakyCollector, StaticCollector,
};
