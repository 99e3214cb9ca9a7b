//! Gamma/hadron separation for IACT event lists.
//!
//! Two tools share this library: `apply` scores events with a trained
//! classifier for the signal and the off-source region, `plot` draws the
//! diagnostic figures of a trained model.

pub mod app;
pub mod apply;
pub mod cli;
pub mod color;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod figure;
pub mod model;
pub mod pdf;
pub mod state;
pub mod ui;
