//! Scenario tests for the reliability engine
//!
//! Tests are organized by topic:
//! - `ang_tang` - Textbook examples 6.7 to 6.10 (Ang & Tang, 1984) with FORM and Monte Carlo
//! - `closed_form` - Limit states with an exact reliability index
//! - `external_model` - Limit states reading outputs of a batch model

mod ang_tang;
mod closed_form;
mod external_model;
