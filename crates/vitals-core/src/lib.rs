//! Vitals-Core: Foundation types for the vital-signs simulator
//!
//! Readings, value ranges, timestamps and the shared error type.

pub mod error;
pub mod reading;
pub mod timestamp;

pub use error::{VitalsError, VitalsResult};
pub use reading::*;
pub use timestamp::*;
