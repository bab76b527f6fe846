//! Vitals-Simulation: synthetic medical device data generation
//!
//! A background worker produces one randomized vital-signs reading per
//! tick, keeps a bounded history and notifies a single observer.

pub mod config;
pub mod history;
pub mod plot;
pub mod simulator;
pub mod vitals_generator;

pub use config::*;
pub use history::*;
pub use plot::*;
pub use simulator::*;
pub use vitals_generator::*;
