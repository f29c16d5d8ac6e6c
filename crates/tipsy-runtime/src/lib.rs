//! `tipsy-runtime` – Behavior Engine
//!
//! Runs Tipsy's four behaviors concurrently against one drive base.  Each
//! monitor polls its own sensors on its own schedule and proposes motion;
//! the kernel's arbiter decides what actually moves.
//!
//! # Modules
//!
//! - [`config`] – [`BehaviorConfig`][config::BehaviorConfig]: thresholds,
//!   intervals and timeouts with their defaults.
//! - [`monitors`] – the [`Monitor`][monitors::Monitor] trait, the four
//!   standard monitors, and [`run_monitor`][monitors::run_monitor], the
//!   poll loop around each of them.
//! - [`supervisor`] – [`Supervisor`][supervisor::Supervisor]: wires the
//!   arbiter and monitors, runs them until shutdown, isolates failures.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: log and span
//!   export setup.
//!
//! # Example
//!
//! ```rust,no_run
//! use tipsy_hal::SimRobot;
//! use tipsy_middleware::LocomotionBus;
//! use tipsy_runtime::{BehaviorConfig, Supervisor};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), tipsy_types::TipsyError> {
//! let sim = SimRobot::builder().build();
//! let supervisor = Supervisor::new(BehaviorConfig::default(), sim.robot(), LocomotionBus::default())?;
//! let cancel = CancellationToken::new();
//! let report = supervisor.run(cancel).await;
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod monitors;
pub mod supervisor;
pub mod telemetry;

pub use config::BehaviorConfig;
pub use monitors::{Monitor, MonitorReport, run_monitor};
pub use supervisor::{MonitorOutcome, Supervisor, SupervisorReport, TaskFailure};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
