//! # scope-bridge
//!
//! Control-plane bridge between a line-oriented SCPI-style text protocol and
//! an oscilloscope's capability layer.
//!
//! ## Crate Structure
//!
//! - **`dispatch`**: parses each line into subject, command and arguments and
//!   routes it through the command sets (generator, shared, instrument-specific).
//! - **`addressing`**: resolves subject tokens (`A`, `1D3`, `EX`, `AWG`) into
//!   channel keys.
//! - **`state`**: the `InstrumentState` aggregate and the `ArmSnapshot` the data
//!   plane decodes with.
//! - **`quantize`**: range ladders, timebase and depth arithmetic, rate/depth
//!   enumeration.
//! - **`instrument`**, **`capture`**, **`generator`**: the operations on an
//!   `Instrument`, which pairs a capability-layer driver with its state behind
//!   one lock.
//! - **`hardware`**: the `ScopeDriver` capability traits, per-family profiles
//!   and a simulated driver.
//! - **`server`** and **`dataplane`**: the blocking TCP session loop and the
//!   capture watcher thread.
//! - **`config`**, **`logging`**, **`error`**: ambient plumbing.

pub mod addressing;
pub mod capture;
pub mod config;
pub mod dataplane;
pub mod dispatch;
pub mod error;
pub mod generator;
pub mod hardware;
pub mod instrument;
pub mod logging;
pub mod quantize;
pub mod server;
pub mod state;
