//! Dataset aggregation.
//!
//! [`mastery`] turns score rows into per-student profiles and class
//! comparisons on the fixed knowledge-point axis. [`submissions`] indexes
//! submission events per student and derives the hourly-radial and calendar
//! views.

pub mod mastery;
pub mod submissions;
pub mod types;
pub mod utility;
