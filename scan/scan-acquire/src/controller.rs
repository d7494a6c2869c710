//! Acquisition mode state machine.
//!
//! Degraded quality is debounced, then answered by switching to the fallback
//! sensing mode after a backoff pause. The pause is a deadline, not a sleep;
//! the caller ticks the controller with pipeline time.

use scan_quality::{
    FinalizationThresholds, GateReport, LiveThresholds, QualityEstimate, QualityReason,
    QualityStatus,
};
use scan_types::{CalibrationResult, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backoff::{BackoffPolicy, BackoffTimer};
use crate::error::{AcquireError, AcquireResult};
use crate::events::{GuidanceEvent, GuidanceReason};
use crate::session::AcquisitionSession;

/// Sensing mode for acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcquisitionMode {
    /// Depth-ranging sensor only.
    Range,
    /// Visual feature triangulation only.
    Feature,
    /// Fused range and feature acquisition.
    Hybrid,
}

impl AcquisitionMode {
    /// The mode to fall back to when this one underperforms.
    #[must_use]
    pub const fn fallback(self) -> Self {
        match self {
            Self::Range => Self::Feature,
            Self::Feature | Self::Hybrid => Self::Range,
        }
    }

    /// Live quality thresholds appropriate for this mode.
    #[must_use]
    pub const fn live_thresholds(self) -> LiveThresholds {
        match self {
            Self::Range => LiveThresholds::range(),
            Self::Feature => LiveThresholds::feature(),
            Self::Hybrid => LiveThresholds::hybrid(),
        }
    }
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No acquisition in progress.
    Idle,
    /// Actively acquiring in a mode.
    Active(AcquisitionMode),
    /// Paused on a backoff deadline before entering a (possibly different)
    /// mode.
    Recovering,
    /// Finalization gate passed; session closed successfully.
    Completed,
    /// Retry budget exhausted; session closed unsuccessfully.
    Failed,
}

impl ControllerState {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active(_) => "active",
            Self::Recovering => "recovering",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Tunables for the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerParams {
    /// Consecutive degraded evaluations before reacting.
    pub debounce: u32,
    /// Recovery backoff schedule.
    pub backoff: BackoffPolicy,
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self {
            debounce: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// The acquisition mode controller.
///
/// Owns the session record and the backoff timer. Pure state machine: all
/// timing arrives through `Timestamp` arguments and all effects leave as
/// [`GuidanceEvent`]s or state transitions.
#[derive(Debug)]
pub struct ModeController {
    params: ControllerParams,
    finalization: FinalizationThresholds,
    state: ControllerState,
    session: Option<AcquisitionSession>,
    backoff: BackoffTimer,
    pending_mode: Option<AcquisitionMode>,
    next_session_id: u64,
    last_status: QualityStatus,
}

impl ModeController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new(params: ControllerParams, finalization: FinalizationThresholds) -> Self {
        Self {
            backoff: BackoffTimer::new(params.backoff),
            params,
            finalization,
            state: ControllerState::Idle,
            session: None,
            pending_mode: None,
            next_session_id: 1,
            last_status: QualityStatus::Unknown,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    /// The session record, if one exists.
    #[must_use]
    pub const fn session(&self) -> Option<&AcquisitionSession> {
        self.session.as_ref()
    }

    /// Starts a session in the requested mode.
    ///
    /// # Errors
    ///
    /// [`AcquireError::InvalidState`] unless idle, and
    /// [`AcquireError::CalibrationExpired`] if the calibration is stale.
    pub fn start(
        &mut self,
        mode: AcquisitionMode,
        calibration: &CalibrationResult,
        now: Timestamp,
    ) -> AcquireResult<&AcquisitionSession> {
        if self.state != ControllerState::Idle || self.session.is_some() {
            return Err(self.invalid_state());
        }
        if calibration.is_expired(now) {
            return Err(AcquireError::CalibrationExpired);
        }
        let id = self.next_session_id;
        self.next_session_id += 1;
        self.session = Some(AcquisitionSession::new(id, mode, calibration.clone(), now));
        self.state = ControllerState::Active(mode);
        self.backoff.reset();
        self.last_status = QualityStatus::Unknown;
        info!(session = id, ?mode, "acquisition started");
        // Session was just stored.
        #[allow(clippy::unwrap_used)]
        Ok(self.session.as_ref().unwrap())
    }

    /// Feeds one quality evaluation into the state machine.
    ///
    /// Returns the guidance events raised by this evaluation. Only meaningful
    /// while active; evaluations arriving in other states (including during a
    /// recovery pause) are recorded but do not move the machine.
    pub fn on_quality(&mut self, estimate: &QualityEstimate, now: Timestamp) -> Vec<GuidanceEvent> {
        self.last_status = estimate.status;
        let ControllerState::Active(mode) = self.state else {
            return Vec::new();
        };
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        match estimate.status {
            QualityStatus::Good | QualityStatus::Excellent => {
                session.consecutive_failures = 0;
                self.backoff.reset();
                session.current_backoff = self.backoff.next_delay();
                Vec::new()
            }
            QualityStatus::Unknown => Vec::new(),
            QualityStatus::Insufficient | QualityStatus::Poor => {
                session.consecutive_failures += 1;
                let mut events: Vec<GuidanceEvent> = estimate
                    .reasons
                    .iter()
                    .map(|r| GuidanceEvent::new(guidance_for(*r), now))
                    .collect();
                if session.consecutive_failures >= self.params.debounce {
                    events.extend(self.begin_recovery(mode, now));
                }
                events
            }
        }
    }

    /// Advances deadline-driven transitions.
    ///
    /// While recovering, re-enters the pending mode once the backoff deadline
    /// passes. Returns the events raised.
    pub fn tick(&mut self, now: Timestamp) -> Vec<GuidanceEvent> {
        if self.state != ControllerState::Recovering || !self.backoff.is_expired(now) {
            return Vec::new();
        }
        self.backoff.disarm();
        let Some(mode) = self.pending_mode.take() else {
            return Vec::new();
        };
        if let Some(session) = self.session.as_mut() {
            session.enter_mode(mode);
            session.consecutive_failures = 0;
        }
        self.state = ControllerState::Active(mode);
        self.last_status = QualityStatus::Unknown;
        debug!(?mode, "recovery pause elapsed, resuming acquisition");
        Vec::new()
    }

    /// True if the last live evaluation permits attempting finalization.
    #[must_use]
    pub fn can_attempt_finalize(&self) -> bool {
        matches!(self.state, ControllerState::Active(_))
            && matches!(
                self.last_status,
                QualityStatus::Good | QualityStatus::Excellent
            )
    }

    /// Applies the finalization gate to post-reconstruction metrics.
    ///
    /// On pass the session completes. On failure the mesh is discarded by the
    /// caller, a failure is counted, and the controller recovers back into
    /// the same mode after a backoff pause.
    ///
    /// # Errors
    ///
    /// [`AcquireError::InvalidState`] unless active.
    pub fn finalize_outcome(
        &mut self,
        report: &GateReport,
        now: Timestamp,
    ) -> AcquireResult<Vec<GuidanceEvent>> {
        let ControllerState::Active(mode) = self.state else {
            return Err(self.invalid_state());
        };
        if report.passed {
            self.state = ControllerState::Completed;
            let id = self.session.as_ref().map_or(0, |s| s.id);
            info!(session = id, "finalization gate passed, session complete");
            return Ok(Vec::new());
        }
        warn!(shortfalls = report.shortfalls.len(), "finalization gate failed");
        if let Some(session) = self.session.as_mut() {
            session.consecutive_failures += 1;
        }
        let mut events = vec![GuidanceEvent::new(GuidanceReason::FinalizeRejected, now)];
        // Pause, then continue scanning in the same mode.
        events.extend(self.schedule_pause(mode, now));
        Ok(events)
    }

    /// The finalization thresholds the controller gates with.
    #[must_use]
    pub const fn finalization_thresholds(&self) -> &FinalizationThresholds {
        &self.finalization
    }

    /// The terminal error for a spent retry budget.
    ///
    /// `Some` once the controller has entered [`ControllerState::Failed`],
    /// carrying the number of recovery attempts consumed.
    #[must_use]
    pub fn failure(&self) -> Option<AcquireError> {
        matches!(self.state, ControllerState::Failed).then(|| {
            AcquireError::QualityThresholdNotMet {
                retries: self.backoff.retries(),
            }
        })
    }

    /// Interrupts the session, clearing any pending deadline.
    ///
    /// The session record survives for [`Self::resume`].
    ///
    /// # Errors
    ///
    /// [`AcquireError::InvalidState`] unless active or recovering.
    pub fn interrupt(&mut self) -> AcquireResult<()> {
        match self.state {
            ControllerState::Active(_) | ControllerState::Recovering => {
                self.backoff.disarm();
                self.pending_mode = None;
                self.state = ControllerState::Idle;
                info!("acquisition interrupted");
                Ok(())
            }
            _ => Err(self.invalid_state()),
        }
    }

    /// Resumes an interrupted session in its last active mode.
    ///
    /// # Errors
    ///
    /// [`AcquireError::NoSession`] without an interrupted session,
    /// [`AcquireError::InvalidState`] unless idle, and
    /// [`AcquireError::CalibrationExpired`] if the session's calibration has
    /// lapsed during the interruption.
    pub fn resume(&mut self, now: Timestamp) -> AcquireResult<AcquisitionMode> {
        if self.state != ControllerState::Idle {
            return Err(self.invalid_state());
        }
        let Some(session) = self.session.as_mut() else {
            return Err(AcquireError::NoSession);
        };
        if session.calibration.is_expired(now) {
            return Err(AcquireError::CalibrationExpired);
        }
        let mode = session.active_mode;
        session.consecutive_failures = 0;
        self.state = ControllerState::Active(mode);
        self.last_status = QualityStatus::Unknown;
        info!(?mode, "acquisition resumed");
        Ok(mode)
    }

    /// Abandons the session entirely.
    pub fn abort(&mut self) {
        self.backoff.reset();
        self.pending_mode = None;
        self.session = None;
        self.state = ControllerState::Idle;
        self.last_status = QualityStatus::Unknown;
    }

    /// Debounce tripped while active: switch to the fallback mode after a
    /// backoff pause, or fail if the budget is spent.
    fn begin_recovery(&mut self, mode: AcquisitionMode, now: Timestamp) -> Vec<GuidanceEvent> {
        let next = mode.fallback();
        let mut events = vec![GuidanceEvent::new(
            GuidanceReason::SwitchingMode { from: mode, to: next },
            now,
        )];
        events.extend(self.schedule_pause(next, now));
        events
    }

    fn schedule_pause(&mut self, next: AcquisitionMode, now: Timestamp) -> Vec<GuidanceEvent> {
        match self.backoff.arm(now) {
            Some(deadline) => {
                self.pending_mode = Some(next);
                self.state = ControllerState::Recovering;
                if let Some(session) = self.session.as_mut() {
                    session.current_backoff = deadline.abs_diff(now);
                }
                debug!(
                    delay_ms = deadline.abs_diff(now).as_millis(),
                    ?next,
                    "recovery pause scheduled"
                );
                vec![GuidanceEvent::new(
                    GuidanceReason::RetryScheduled {
                        delay: deadline.abs_diff(now),
                    },
                    now,
                )]
            }
            None => {
                self.state = ControllerState::Failed;
                warn!(retries = self.backoff.retries(), "retry budget exhausted");
                vec![GuidanceEvent::new(GuidanceReason::RetryExhausted, now)]
            }
        }
    }

    fn invalid_state(&self) -> AcquireError {
        AcquireError::InvalidState {
            state: self.state.name().to_string(),
        }
    }
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new(ControllerParams::default(), FinalizationThresholds::default())
    }
}

const fn guidance_for(reason: QualityReason) -> GuidanceReason {
    match reason {
        QualityReason::LowDensity => GuidanceReason::MoveCloser,
        QualityReason::ExcessiveMotion | QualityReason::WeakFeatureTracking => {
            GuidanceReason::HoldSteady
        }
        QualityReason::PoorLighting => GuidanceReason::ImproveLighting,
    }
}
