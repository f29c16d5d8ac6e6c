//! `tipsy-hal` – Hardware Abstraction Layer
//!
//! The behavior engine never talks to a concrete robot.  It talks to the
//! traits in this crate, and a session layer (or the in-process [`sim`])
//! supplies the implementations.
//!
//! # Modules
//!
//! - [`base`] – [`Base`][base::Base]: the drive base executing
//!   move-straight / spin / stop commands.
//! - [`sensors`] – [`RangingSensor`][sensors::RangingSensor] and
//!   [`OrientationSensor`][sensors::OrientationSensor].
//! - [`perception`] – [`PerceptionService`][perception::PerceptionService]:
//!   the person-detection inference pipeline.
//! - [`sim`] – stub implementations of every trait with settable readings and
//!   injectable failures, for tests and headless runs.
//! - [`sim_robot`] – [`SimRobot`][sim_robot::SimRobot]: builder that wires a
//!   complete simulated robot.

use std::sync::Arc;

pub mod base;
pub mod perception;
pub mod sensors;
pub mod sim;
pub mod sim_robot;

pub use base::Base;
pub use perception::PerceptionService;
pub use sensors::{OrientationSensor, RangingSensor, ranging_sensor_id};
pub use sim_robot::SimRobot;

/// The set of collaborator handles the behavior engine needs.
#[derive(Clone)]
pub struct Robot {
    pub base: Arc<dyn Base>,
    pub ranging: Vec<Arc<dyn RangingSensor>>,
    pub orientation: Arc<dyn OrientationSensor>,
    pub perception: Arc<dyn PerceptionService>,
}
