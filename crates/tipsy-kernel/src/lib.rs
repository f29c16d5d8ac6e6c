//! `tipsy-kernel` – Safety & Arbitration
//!
//! The brainstem of Tipsy.  It does not decide what the robot wants; it
//! decides which request wins and makes sure the base never ends up stuck.
//!
//! # Modules
//!
//! - [`register`] – [`LocomotionRegister`][register::LocomotionRegister]:
//!   the single-writer locomotion state register, and
//!   [`LocomotionHandle`][register::LocomotionHandle], the read-only view
//!   every monitor holds.
//! - [`motion`] – [`execute`][motion::execute]: validates and runs one
//!   [`Primitive`][tipsy_types::Primitive] against a
//!   [`Base`][tipsy_hal::Base], bounded by a timeout.
//! - [`arbiter`] – [`Arbiter`][arbiter::Arbiter]: serializes intents from
//!   all monitors, resolves them by priority, preempts in-flight motion for
//!   `Stop`/`Recover`, and is the only writer of the register.
//! - [`tipping`] – [`TipDetector`][tipping::TipDetector]: pluggable
//!   orientation-to-"tipping" predicate.
//! - [`watchdog`] – [`Watchdog`][watchdog::Watchdog]: heartbeat tracking that
//!   flags monitors which stopped ticking.

pub mod arbiter;
pub mod motion;
pub mod register;
pub mod tipping;
pub mod watchdog;

pub use arbiter::{Arbiter, ArbiterReport, IntentSender, Resolution, Submission, Verdict, resolve};
pub use register::{LocomotionHandle, LocomotionRegister, Transition};
pub use tipping::{PitchLimit, TipDetector};
pub use watchdog::{MonitorHealth, Watchdog};
