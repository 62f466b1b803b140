//! Toolkit for the customer-complaint spreadsheets handled by the operations
//! desk.
//!
//! The one shipped task, [`task::top_customers`], selects rows of a ranked
//! customer table, filters a detail table by fixed-value conditions, joins the
//! two on station, K-code and customer name, and writes the result as `.xlsx`.

pub mod config;
pub mod data;
pub mod error;
pub mod task;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use task::{TaskOutcome, TaskRegistry};
