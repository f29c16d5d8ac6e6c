//! `tipsy-middleware` – The Nervous System
//!
//! Routes locomotion events from the arbiter to any observer (console,
//! telemetry exporters, tests) without caring what they do with them.
//!
//! # Modules
//!
//! - [`bus`] – broadcast event bus with topic-filtered subscribers, built on
//!   Tokio broadcast channels.

pub mod bus;

pub use bus::{LocomotionBus, Topic, TopicSubscriber};
