pub mod alerts;
pub mod config;
pub mod polling;

#[cfg(test)]
mod test_support;

pub use alerts::{check_alerts, AlertDeps, FailureAlert, StaleRunAlert};
pub use config::SchedulerConfig;
pub use polling::{poll_all_companies, poll_all_filings, PollingDeps};
