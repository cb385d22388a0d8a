pub mod accumulator;
pub mod cli;
pub mod error;
pub mod metrics;
pub mod model;
pub mod telemetry;
pub mod warnings;
pub mod xml;
