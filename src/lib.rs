//! waste-report: municipal solid-waste report for Peru, 2014-2021.
//!
//! Loads the waste and ubigeo tables, aggregates them per period,
//! department and district, and serves the results through a
//! configurable menu tree, in a terminal dashboard or headlessly.

pub mod dispatch;
pub mod error;
pub mod logging;
pub mod navigation;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod tui;
pub mod types;
pub mod views;
