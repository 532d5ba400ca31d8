//! SAR CLI - run the mission simulation without a server.
//!
//! - `headless`: drives a mission on a virtual clock
//! - `report`: end-of-run summary in text or JSON
//!
//! The `sar-sim` binary wires both to command line flags.

pub mod headless;
pub mod report;

pub use headless::Headless;
pub use report::Report;
