//! Interactive terminal dashboard.
//!
//! - `state`: App, Page, Focus, Action, Transition
//! - `update`: pure transitions
//! - `view`: pure rendering
//! - `run`: terminal, key reader, effect handling

pub mod run;
pub mod state;
pub mod theme;
pub mod update;
pub mod view;

pub use run::run;
