//! [`Arbiter`] – priority resolution, preemption and the locomotion state
//! machine.
//!
//! Monitors never touch the base.  They hand a [`MotionIntent`] to an
//! [`IntentSender`] and wait for a [`Verdict`].  The arbiter task owns the
//! base, the [`LocomotionRegister`] and the receiving end of the intent
//! channel, and runs one *arbitration cycle* at a time:
//!
//! 1. Wait for a submission, then drain everything else already queued.
//!    That batch is the cycle.
//! 2. [`resolve`] the batch: the highest-priority intent wins
//!    (`Recover > Stop > Approach > ExploreSpin`), submissions of the same
//!    kind are coalesced into that one execution, everything else is
//!    discarded for this cycle.
//! 3. Execute the winner's primitive plan, entering each primitive's moving
//!    state and returning to idle afterwards, on success or failure.
//! 4. While the plan runs, keep reading the intent channel.  A `Stop` or
//!    `Recover` of higher priority than the running intent preempts it: the
//!    in-flight primitive is abandoned, the base is stopped, the register
//!    goes idle, and the preempting submission opens the next cycle.  Any
//!    other arrival is discarded.
//!
//! Cancelling the shutdown token abandons whatever is running, stops the
//! base and leaves the register idle.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tipsy_hal::Base;
use tipsy_middleware::LocomotionBus;
use tipsy_types::{
    IntentKind, LocomotionEvent, LocomotionPayload, LocomotionState, MonitorKind, MotionError,
    MotionIntent, Primitive, TipsyError,
};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::motion;
use crate::register::{LocomotionHandle, LocomotionRegister};

/// Source tag for events published on the bus.
const EVENT_SOURCE: &str = "tipsy-kernel::arbiter";

/// Intent channel depth.  Each monitor has at most one submission
/// outstanding, so this is never the limiting factor.
const INTENT_CHANNEL_CAPACITY: usize = 64;

// ────────────────────────────────────────────────────────────────────────────
// Submissions & verdicts
// ────────────────────────────────────────────────────────────────────────────

/// What became of a submitted intent.  Every submission receives exactly
/// one verdict, unless the arbiter shuts down first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    /// Ran to completion (directly, or coalesced into an identical intent).
    Executed,
    /// Lost its cycle to `winner`, or arrived while `winner` was running and
    /// could not preempt it.
    Discarded { winner: IntentKind },
    /// Was running and got interrupted by `by`.
    Preempted { by: IntentKind },
    /// Ran and the base reported a failure.  The register is idle again.
    Failed(MotionError),
}

/// An intent on its way to the arbiter.
#[derive(Debug)]
pub struct Submission {
    pub intent: MotionIntent,
    pub source: MonitorKind,
    reply: Option<oneshot::Sender<Verdict>>,
}

impl Submission {
    /// A submission plus the receiver its verdict will arrive on.
    pub fn new(source: MonitorKind, intent: MotionIntent) -> (Self, oneshot::Receiver<Verdict>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                intent,
                source,
                reply: Some(tx),
            },
            rx,
        )
    }

    /// A submission nobody waits on.
    pub fn detached(source: MonitorKind, intent: MotionIntent) -> Self {
        Self {
            intent,
            source,
            reply: None,
        }
    }

    pub fn kind(&self) -> IntentKind {
        self.intent.kind()
    }

    fn respond(self, verdict: Verdict) {
        if let Some(reply) = self.reply {
            // Submitter may have stopped waiting.
            let _ = reply.send(verdict);
        }
    }
}

/// Cloneable submitting side of the arbiter's intent channel.
#[derive(Debug, Clone)]
pub struct IntentSender {
    tx: mpsc::Sender<Submission>,
}

impl IntentSender {
    /// Submit `intent` and wait for its verdict.
    ///
    /// For an intent that wins its cycle this resolves only once the motion
    /// has finished, failed or been preempted.
    ///
    /// # Errors
    ///
    /// [`TipsyError::ArbiterUnavailable`] if the arbiter has stopped.
    pub async fn submit(
        &self,
        source: MonitorKind,
        intent: MotionIntent,
    ) -> Result<Verdict, TipsyError> {
        let (submission, verdict) = Submission::new(source, intent);
        self.send(submission).await?;
        verdict.await.map_err(|_| TipsyError::ArbiterUnavailable)
    }

    /// Enqueue a prepared submission without waiting for its verdict.
    pub async fn send(&self, submission: Submission) -> Result<(), TipsyError> {
        self.tx
            .send(submission)
            .await
            .map_err(|_| TipsyError::ArbiterUnavailable)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resolution
// ────────────────────────────────────────────────────────────────────────────

/// The outcome of resolving one cycle's batch.
#[derive(Debug)]
pub struct Resolution {
    /// The first-submitted intent of the highest-priority kind.  Its
    /// parameters are the ones executed.
    pub winner: Submission,
    /// Later submissions of the winner's kind, folded into its execution.
    pub coalesced: Vec<Submission>,
    /// Everything of lower priority.
    pub discarded: Vec<Submission>,
}

/// Pick the winner of a batch of concurrently-submitted intents.
///
/// Returns `None` for an empty batch.
pub fn resolve(batch: Vec<Submission>) -> Option<Resolution> {
    let top = batch.iter().map(Submission::kind).max()?;

    let mut winner = None;
    let mut coalesced = Vec::new();
    let mut discarded = Vec::new();
    for submission in batch {
        if submission.kind() != top {
            discarded.push(submission);
        } else if winner.is_none() {
            winner = Some(submission);
        } else {
            coalesced.push(submission);
        }
    }

    winner.map(|winner| Resolution {
        winner,
        coalesced,
        discarded,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

/// Counters accumulated over the arbiter's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbiterReport {
    pub cycles: u64,
    pub executed: u64,
    /// Duplicate submissions folded into another execution.
    pub coalesced: u64,
    pub discarded: u64,
    pub preemptions: u64,
    pub motion_failures: u64,
    /// Cycles in which two preempting kinds collided.
    pub preemption_races: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Driver: base + register + bus
// ────────────────────────────────────────────────────────────────────────────

/// Everything the arbiter touches while a plan is running.  Kept apart from
/// the intent receiver so both can be borrowed at once.
struct Driver {
    base: Arc<dyn Base>,
    register: LocomotionRegister,
    bus: LocomotionBus,
    motion_timeout: Duration,
}

impl Driver {
    fn publish(&self, payload: LocomotionPayload) {
        self.bus.publish(LocomotionEvent::new(EVENT_SOURCE, payload));
    }

    fn transition(&self, to: LocomotionState) {
        if let Some(transition) = self.register.transition_to(to) {
            debug!(from = %transition.from, to = %transition.to, "Locomotion state changed");
            self.publish(LocomotionPayload::StateChanged {
                from: transition.from,
                to: transition.to,
            });
        }
    }

    /// Stop the base and go idle.  A failing `stop()` is logged; the
    /// register goes idle regardless.  An idle register keeps its
    /// `last_idle_at`.
    async fn halt(&self) {
        let was = self.register.read().state;
        if let Err(error) =
            motion::execute(self.base.as_ref(), &Primitive::Stop, self.motion_timeout).await
        {
            warn!(%error, "Base stop failed");
        }
        if was.is_moving() {
            debug!(from = %was, "Base halted mid-motion");
            self.transition(LocomotionState::Idle);
        }
    }

    /// Run every primitive of `intent` in order, then go idle.
    async fn execute_plan(&self, intent: &MotionIntent) -> Result<(), MotionError> {
        for primitive in intent.plan()? {
            if let Some(state) = primitive.locomotion_state() {
                self.transition(state);
            }
            if let Err(error) =
                motion::execute(self.base.as_ref(), &primitive, self.motion_timeout).await
            {
                self.halt().await;
                return Err(error);
            }
        }
        self.transition(LocomotionState::Idle);
        Ok(())
    }

    fn discard(&self, submission: Submission, winner: IntentKind) {
        debug!(
            intent = %submission.kind(),
            monitor = %submission.source,
            %winner,
            "Intent discarded"
        );
        self.publish(LocomotionPayload::IntentDiscarded {
            intent: submission.intent.clone(),
            winner,
        });
        submission.respond(Verdict::Discarded { winner });
    }
}

enum Outcome {
    Finished(Result<(), MotionError>),
    Preempted(Submission),
    Cancelled,
}

// ────────────────────────────────────────────────────────────────────────────
// Arbiter
// ────────────────────────────────────────────────────────────────────────────

/// The single writer of the locomotion register and the sole caller of the
/// base.
pub struct Arbiter {
    driver: Driver,
    intents: mpsc::Receiver<Submission>,
    report: ArbiterReport,
}

impl Arbiter {
    /// Build an arbiter that starts idle, and the sender monitors submit
    /// through.  Every base command is bounded by `motion_timeout`.
    pub fn new(
        base: Arc<dyn Base>,
        bus: LocomotionBus,
        motion_timeout: Duration,
    ) -> (Self, IntentSender) {
        let (tx, intents) = mpsc::channel(INTENT_CHANNEL_CAPACITY);
        let arbiter = Self {
            driver: Driver {
                base,
                register: LocomotionRegister::new(),
                bus,
                motion_timeout,
            },
            intents,
            report: ArbiterReport::default(),
        };
        (arbiter, IntentSender { tx })
    }

    /// A read handle onto the register this arbiter writes.
    pub fn locomotion(&self) -> LocomotionHandle {
        self.driver.register.handle()
    }

    /// Arbitrate until `cancel` fires or every [`IntentSender`] is dropped.
    pub async fn run(mut self, cancel: CancellationToken) -> ArbiterReport {
        info!(base = self.driver.base.id(), "Arbiter started");
        let mut pending: Option<Submission> = None;

        loop {
            let first = match pending.take() {
                Some(submission) => submission,
                None => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = self.intents.recv() => match next {
                        Some(submission) => submission,
                        None => break,
                    },
                },
            };

            let mut batch = vec![first];
            while let Ok(more) = self.intents.try_recv() {
                batch.push(more);
            }

            pending = self.cycle(batch, &cancel).await;
            if cancel.is_cancelled() {
                break;
            }
        }

        self.driver.halt().await;
        info!(report = ?self.report, "Arbiter stopped");
        self.report
    }

    /// One arbitration cycle.  Returns the submission that preempted the
    /// winner, if any, so it can open the next cycle.
    async fn cycle(
        &mut self,
        batch: Vec<Submission>,
        cancel: &CancellationToken,
    ) -> Option<Submission> {
        let Resolution {
            winner,
            coalesced,
            discarded,
        } = resolve(batch)?;
        self.report.cycles += 1;

        let kind = winner.kind();
        for loser in discarded {
            if kind.preempts() && loser.kind().preempts() {
                let race = TipsyError::PreemptionRace {
                    winner: kind,
                    loser: loser.kind(),
                };
                warn!(%race, "Concurrent preempting intents");
                self.report.preemption_races += 1;
            }
            self.report.discarded += 1;
            self.driver.discard(loser, kind);
        }
        self.report.coalesced += coalesced.len() as u64;

        let intent = winner.intent.clone();
        let mut group = Vec::with_capacity(coalesced.len() + 1);
        group.push(winner);
        group.extend(coalesced);
        debug!(intent = %kind, submitters = group.len(), "Arbitration cycle");

        let mut intake_open = true;
        let outcome = {
            let execution = self.driver.execute_plan(&intent);
            tokio::pin!(execution);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break Outcome::Cancelled,
                    result = &mut execution => break Outcome::Finished(result),
                    next = self.intents.recv(), if intake_open => match next {
                        Some(incoming) if incoming.kind().preempts() && incoming.kind() > kind => {
                            break Outcome::Preempted(incoming);
                        }
                        Some(incoming) => {
                            self.report.discarded += 1;
                            self.driver.discard(incoming, kind);
                        }
                        None => intake_open = false,
                    },
                }
            }
        };

        match outcome {
            Outcome::Finished(Ok(())) => {
                self.report.executed += 1;
                info!(intent = %kind, coalesced = group.len() - 1, "Intent executed");
                self.driver.publish(LocomotionPayload::IntentExecuted {
                    intent,
                    coalesced: group.len() - 1,
                });
                for submission in group {
                    submission.respond(Verdict::Executed);
                }
                None
            }
            Outcome::Finished(Err(error)) => {
                self.report.motion_failures += 1;
                warn!(intent = %kind, %error, "Motion failed, base is idle");
                self.driver.publish(LocomotionPayload::MotionFault {
                    intent,
                    error: error.clone(),
                });
                for submission in group {
                    submission.respond(Verdict::Failed(error.clone()));
                }
                None
            }
            Outcome::Preempted(incoming) => {
                let by = incoming.kind();
                self.driver.halt().await;
                self.report.preemptions += 1;
                info!(intent = %kind, %by, monitor = %incoming.source, "Intent preempted");
                self.driver
                    .publish(LocomotionPayload::IntentPreempted { intent, by });
                for submission in group {
                    submission.respond(Verdict::Preempted { by });
                }
                Some(incoming)
            }
            Outcome::Cancelled => {
                debug!(intent = %kind, "Shutdown during execution");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tipsy_hal::sim::SimBase;
    use tipsy_middleware::Topic;
    use tokio::task::JoinHandle;
    use tokio::time::Instant;

    const MOTION_TIMEOUT: Duration = Duration::from_secs(30);

    fn all_intents() -> [MotionIntent; 4] {
        [
            MotionIntent::explore_spin(90.0),
            MotionIntent::approach(),
            MotionIntent::Stop,
            MotionIntent::recover(),
        ]
    }

    fn detached(intent: MotionIntent) -> Submission {
        Submission::detached(MonitorKind::PersonSeek, intent)
    }

    fn permutations(items: &[MotionIntent]) -> Vec<Vec<MotionIntent>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    struct Harness {
        base: Arc<SimBase>,
        bus: LocomotionBus,
        sender: IntentSender,
        locomotion: LocomotionHandle,
        cancel: CancellationToken,
        task: JoinHandle<ArbiterReport>,
    }

    fn start() -> Harness {
        let base = Arc::new(SimBase::new("tipsy-base"));
        let bus = LocomotionBus::default();
        let (arbiter, sender) = Arbiter::new(base.clone(), bus.clone(), MOTION_TIMEOUT);
        let locomotion = arbiter.locomotion();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(arbiter.run(cancel.clone()));
        Harness {
            base,
            bus,
            sender,
            locomotion,
            cancel,
            task,
        }
    }

    // ── resolve ─────────────────────────────────────────────────────────────

    #[test]
    fn resolve_empty_batch_is_none() {
        assert!(resolve(Vec::new()).is_none());
    }

    #[test]
    fn resolve_picks_highest_priority_in_every_order() {
        let intents = all_intents();
        // Every non-empty subset, in every order.
        for mask in 1u8..16 {
            let subset: Vec<_> = (0..4)
                .filter(|i| mask & (1 << i) != 0)
                .map(|i| intents[i].clone())
                .collect();
            let expected = subset.iter().map(MotionIntent::kind).max().unwrap();
            for order in permutations(&subset) {
                let resolution = resolve(order.into_iter().map(detached).collect()).unwrap();
                assert_eq!(resolution.winner.kind(), expected);
                assert!(resolution.coalesced.is_empty());
                assert_eq!(resolution.discarded.len(), subset.len() - 1);
                assert!(resolution.discarded.iter().all(|s| s.kind() < expected));
            }
        }
    }

    #[test]
    fn resolve_coalesces_same_kind_and_keeps_first_parameters() {
        let batch = vec![
            detached(MotionIntent::explore_spin(10.0)),
            detached(MotionIntent::explore_spin(200.0)),
            detached(MotionIntent::explore_spin(300.0)),
        ];
        let resolution = resolve(batch).unwrap();
        assert_eq!(resolution.winner.intent, MotionIntent::explore_spin(10.0));
        assert_eq!(resolution.coalesced.len(), 2);
        assert!(resolution.discarded.is_empty());
    }

    // ── execution ───────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn executed_intent_ends_idle_with_fresh_timestamp() {
        let h = start();
        let verdict = h
            .sender
            .submit(MonitorKind::PersonSeek, MotionIntent::approach())
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Executed);

        let snapshot = h.locomotion.read();
        assert_eq!(snapshot.state, LocomotionState::Idle);
        assert_eq!(snapshot.last_idle_at, Instant::now());
        assert_eq!(h.base.odometer_mm(), 800.0);
        assert_eq!(
            h.base.motions(),
            vec![Primitive::MoveStraight {
                distance_mm: 800,
                speed_mm_s: 250
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_preempts_approach() {
        let h = start();
        let approach = {
            let sender = h.sender.clone();
            tokio::spawn(async move {
                sender
                    .submit(MonitorKind::PersonSeek, MotionIntent::approach())
                    .await
            })
        };
        let mut forward = h.locomotion.clone();
        forward.wait_for(LocomotionState::MovingForward).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let stop = h
            .sender
            .submit(MonitorKind::Obstacle, MotionIntent::Stop)
            .await
            .unwrap();
        assert_eq!(stop, Verdict::Executed);
        assert_eq!(
            approach.await.unwrap().unwrap(),
            Verdict::Preempted {
                by: IntentKind::Stop
            }
        );

        assert_eq!(h.locomotion.state(), LocomotionState::Idle);
        assert!(h.base.last_move_progress_mm() < 800.0);
        assert!(h.base.stop_count() >= 1);

        h.cancel.cancel();
        let report = h.task.await.unwrap();
        assert_eq!(report.preemptions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lower_priority_arrivals_do_not_interrupt() {
        let h = start();
        let approach = {
            let sender = h.sender.clone();
            tokio::spawn(async move {
                sender
                    .submit(MonitorKind::PersonSeek, MotionIntent::approach())
                    .await
            })
        };
        h.locomotion
            .clone()
            .wait_for(LocomotionState::MovingForward)
            .await
            .unwrap();

        let spin = h
            .sender
            .submit(MonitorKind::IdleTimeout, MotionIntent::explore_spin(45.0))
            .await
            .unwrap();
        assert_eq!(
            spin,
            Verdict::Discarded {
                winner: IntentKind::Approach
            }
        );
        assert_eq!(approach.await.unwrap().unwrap(), Verdict::Executed);
        assert_eq!(h.base.odometer_mm(), 800.0);
    }

    #[tokio::test(start_paused = true)]
    async fn recover_backs_then_turns_and_ends_idle() {
        let h = start();
        let mut states = h.bus.subscribe_topic(Topic::State);

        let verdict = h
            .sender
            .submit(MonitorKind::CollisionRecovery, MotionIntent::recover())
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Executed);
        assert_eq!(
            h.base.motions(),
            vec![
                Primitive::MoveStraight {
                    distance_mm: -800,
                    speed_mm_s: 100
                },
                Primitive::Spin {
                    degrees: 180.0,
                    angular_speed_deg_s: 45.0
                },
            ]
        );

        let mut seen = Vec::new();
        for _ in 0..3 {
            match states.recv().await.unwrap().payload {
                LocomotionPayload::StateChanged { to, .. } => seen.push(to),
                other => panic!("unexpected payload {other:?}"),
            }
        }
        assert_eq!(
            seen,
            vec![
                LocomotionState::MovingBackward,
                LocomotionState::Spinning,
                LocomotionState::Idle
            ]
        );
        assert_eq!(h.locomotion.state(), LocomotionState::Idle);
    }

    /// Start `first` from PersonSeek, wait until the base is in `moving`,
    /// then submit Recover.  Returns the first intent's verdict.
    async fn recover_during(h: &Harness, first: MotionIntent, moving: LocomotionState) -> Verdict {
        let first = {
            let sender = h.sender.clone();
            tokio::spawn(async move { sender.submit(MonitorKind::PersonSeek, first).await })
        };
        h.locomotion.clone().wait_for(moving).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let recover = h
            .sender
            .submit(MonitorKind::CollisionRecovery, MotionIntent::recover())
            .await
            .unwrap();
        assert_eq!(recover, Verdict::Executed);
        first.await.unwrap().unwrap()
    }

    fn recovery_after(interrupted: Primitive) -> Vec<Primitive> {
        vec![
            interrupted,
            Primitive::Stop,
            Primitive::MoveStraight {
                distance_mm: -800,
                speed_mm_s: 100,
            },
            Primitive::Spin {
                degrees: 180.0,
                angular_speed_deg_s: 45.0,
            },
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn recover_preempts_approach_and_ends_idle() {
        let h = start();
        let verdict = recover_during(
            &h,
            MotionIntent::approach(),
            LocomotionState::MovingForward,
        )
        .await;
        assert_eq!(
            verdict,
            Verdict::Preempted {
                by: IntentKind::Recover
            }
        );

        assert_eq!(h.locomotion.state(), LocomotionState::Idle);
        assert_eq!(
            h.base.commands(),
            recovery_after(Primitive::MoveStraight {
                distance_mm: 800,
                speed_mm_s: 250
            })
        );

        h.cancel.cancel();
        let report = h.task.await.unwrap();
        assert_eq!(report.preemptions, 1);
        assert_eq!(report.executed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recover_preempts_explore_spin_and_ends_idle() {
        let h = start();
        let verdict = recover_during(
            &h,
            MotionIntent::explore_spin(270.0),
            LocomotionState::Spinning,
        )
        .await;
        assert_eq!(
            verdict,
            Verdict::Preempted {
                by: IntentKind::Recover
            }
        );

        assert_eq!(h.locomotion.state(), LocomotionState::Idle);
        assert_eq!(
            h.base.commands(),
            recovery_after(Primitive::Spin {
                degrees: 270.0,
                angular_speed_deg_s: 45.0
            })
        );

        h.cancel.cancel();
        assert_eq!(h.task.await.unwrap().preemptions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_while_idle_keeps_idle_timestamp() {
        let h = start();
        let before = h.locomotion.read();
        tokio::time::sleep(Duration::from_secs(3)).await;

        h.cancel.cancel();
        h.task.await.unwrap();
        assert_eq!(h.base.commands(), vec![Primitive::Stop]);
        assert_eq!(h.locomotion.read(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn recover_is_never_preempted_by_stop() {
        let h = start();
        let recover = {
            let sender = h.sender.clone();
            tokio::spawn(async move {
                sender
                    .submit(MonitorKind::CollisionRecovery, MotionIntent::recover())
                    .await
            })
        };
        h.locomotion
            .clone()
            .wait_for(LocomotionState::MovingBackward)
            .await
            .unwrap();

        let stop = h
            .sender
            .submit(MonitorKind::Obstacle, MotionIntent::Stop)
            .await
            .unwrap();
        assert_eq!(
            stop,
            Verdict::Discarded {
                winner: IntentKind::Recover
            }
        );
        assert_eq!(recover.await.unwrap().unwrap(), Verdict::Executed);
        assert_eq!(h.base.motions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn motion_failure_returns_to_idle_and_reaches_submitter() {
        let h = start();
        let mut faults = h.bus.subscribe_topic(Topic::Faults);
        h.base.set_failing(true);

        let verdict = h
            .sender
            .submit(MonitorKind::PersonSeek, MotionIntent::explore_spin(90.0))
            .await
            .unwrap();
        assert!(matches!(
            verdict,
            Verdict::Failed(MotionError::CommandFailed { .. })
        ));
        let snapshot = h.locomotion.read();
        assert_eq!(snapshot.state, LocomotionState::Idle);
        assert_eq!(snapshot.last_idle_at, Instant::now());
        assert!(faults.recv().await.is_some());

        h.cancel.cancel();
        assert_eq!(h.task.await.unwrap().motion_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_idle_calls_base_and_keeps_register() {
        let h = start();
        let before = h.locomotion.read();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let verdict = h
            .sender
            .submit(MonitorKind::Obstacle, MotionIntent::Stop)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Executed);
        assert_eq!(h.base.stop_count(), 1);
        assert_eq!(h.locomotion.read(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_batch_resolves_once_and_counts_races() {
        let base = Arc::new(SimBase::new("tipsy-base"));
        let (arbiter, sender) = Arbiter::new(base.clone(), LocomotionBus::default(), MOTION_TIMEOUT);

        let (stop, stop_verdict) = Submission::new(MonitorKind::Obstacle, MotionIntent::Stop);
        let (spin_a, spin_a_verdict) =
            Submission::new(MonitorKind::PersonSeek, MotionIntent::explore_spin(30.0));
        let (recover, recover_verdict) =
            Submission::new(MonitorKind::CollisionRecovery, MotionIntent::recover());
        let (spin_b, spin_b_verdict) =
            Submission::new(MonitorKind::IdleTimeout, MotionIntent::explore_spin(60.0));
        for submission in [stop, spin_a, recover, spin_b] {
            sender.send(submission).await.unwrap();
        }
        drop(sender);

        let report = arbiter.run(CancellationToken::new()).await;

        assert_eq!(recover_verdict.await.unwrap(), Verdict::Executed);
        for verdict in [stop_verdict, spin_a_verdict, spin_b_verdict] {
            assert_eq!(
                verdict.await.unwrap(),
                Verdict::Discarded {
                    winner: IntentKind::Recover
                }
            );
        }
        assert_eq!(report.cycles, 1);
        assert_eq!(report.executed, 1);
        assert_eq!(report.discarded, 3);
        assert_eq!(report.preemption_races, 1);
        assert_eq!(base.motions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_spins_in_one_cycle_run_once() {
        let base = Arc::new(SimBase::new("tipsy-base"));
        let (arbiter, sender) = Arbiter::new(base.clone(), LocomotionBus::default(), MOTION_TIMEOUT);

        let (first, first_verdict) =
            Submission::new(MonitorKind::PersonSeek, MotionIntent::explore_spin(90.0));
        let (second, second_verdict) =
            Submission::new(MonitorKind::IdleTimeout, MotionIntent::explore_spin(270.0));
        sender.send(first).await.unwrap();
        sender.send(second).await.unwrap();
        drop(sender);

        let report = arbiter.run(CancellationToken::new()).await;
        assert_eq!(first_verdict.await.unwrap(), Verdict::Executed);
        assert_eq!(second_verdict.await.unwrap(), Verdict::Executed);
        assert_eq!(report.coalesced, 1);
        assert_eq!(
            base.motions(),
            vec![Primitive::Spin {
                degrees: 90.0,
                angular_speed_deg_s: 45.0
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_mid_motion_stops_base_and_idles() {
        let h = start();
        let sender = h.sender.clone();
        let spin = tokio::spawn(async move {
            sender
                .submit(MonitorKind::PersonSeek, MotionIntent::explore_spin(300.0))
                .await
        });
        h.locomotion
            .clone()
            .wait_for(LocomotionState::Spinning)
            .await
            .unwrap();

        h.cancel.cancel();
        h.task.await.unwrap();
        assert_eq!(h.locomotion.state(), LocomotionState::Idle);
        assert_eq!(h.base.stop_count(), 1);
        assert!(matches!(
            spin.await.unwrap(),
            Err(TipsyError::ArbiterUnavailable)
        ));
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_unavailable() {
        let h = start();
        h.cancel.cancel();
        h.task.await.unwrap();
        let err = h
            .sender
            .submit(MonitorKind::IdleTimeout, MotionIntent::explore_spin(1.0))
            .await
            .unwrap_err();
        assert_eq!(err, TipsyError::ArbiterUnavailable);
    }
}
