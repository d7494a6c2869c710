//! Calibration session management and certification gating.

use scan_types::{CalibrationResult, Duration, PoseTransform, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CalibrationError;
use crate::store::CalibrationStore;

/// Store key under which the active calibration blob is persisted.
const STORE_KEY: &str = "calibration/active";

/// Certification floors and expiry policy.
///
/// # Example
///
/// ```
/// use scan_calibrate::CalibrationPolicy;
///
/// let policy = CalibrationPolicy::default();
/// assert!((policy.min_accuracy - 0.98).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPolicy {
    /// Minimum accuracy score.
    pub min_accuracy: f64,
    /// Minimum stability score.
    pub min_stability: f64,
    /// Minimum coverage score.
    pub min_coverage: f64,
    /// How long a certified calibration stays valid.
    pub expiry: Duration,
}

impl Default for CalibrationPolicy {
    fn default() -> Self {
        Self {
            min_accuracy: 0.98,
            min_stability: 0.95,
            min_coverage: 0.90,
            expiry: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl CalibrationPolicy {
    /// Policy for clinics in high-vibration environments: same floors,
    /// shorter validity.
    #[must_use]
    pub fn high_vibration() -> Self {
        Self {
            expiry: Duration::from_secs(4 * 60 * 60),
            ..Self::default()
        }
    }

    /// Overrides the expiry interval.
    #[must_use]
    pub const fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }
}

/// Raw measurements gathered during a calibration routine.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationMeasurements {
    /// Geometric accuracy score in `[0, 1]`.
    pub accuracy: f64,
    /// Measurement stability score in `[0, 1]`.
    pub stability: f64,
    /// Spatial coverage score in `[0, 1]`.
    pub coverage: f64,
    /// Fitted sensor correction transform.
    pub transform: PoseTransform,
}

/// Handle for an in-progress calibration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationSession {
    /// Opaque session id.
    pub id: u64,
    /// When the session started.
    pub started_at: Timestamp,
}

/// Validates and certifies sensor calibration before scan sessions may start.
///
/// Only one calibration session may be active at a time; a second
/// `start_calibration` fails with [`CalibrationError::CalibrationInProgress`].
///
/// # Example
///
/// ```
/// use scan_calibrate::{CalibrationManager, CalibrationMeasurements, CalibrationPolicy, MemoryStore};
/// use scan_types::{PoseTransform, Timestamp};
///
/// let mut manager = CalibrationManager::new(Box::new(MemoryStore::new()), CalibrationPolicy::default());
/// let session = manager.start_calibration(Timestamp::zero()).unwrap();
/// let measurements = CalibrationMeasurements {
///     accuracy: 0.99,
///     stability: 0.97,
///     coverage: 0.95,
///     transform: PoseTransform::identity(),
/// };
/// let result = manager.complete_calibration(session, &measurements, Timestamp::from_secs_f64(5.0)).unwrap();
/// assert!(!result.is_expired(Timestamp::from_secs_f64(10.0)));
/// ```
pub struct CalibrationManager {
    store: Box<dyn CalibrationStore>,
    policy: CalibrationPolicy,
    active_session: Option<CalibrationSession>,
    cached: Option<CalibrationResult>,
    next_session_id: u64,
}

impl std::fmt::Debug for CalibrationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationManager")
            .field("policy", &self.policy)
            .field("active_session", &self.active_session)
            .field("calibrated", &self.cached.is_some())
            .finish_non_exhaustive()
    }
}

impl CalibrationManager {
    /// Creates a manager over an injected store, loading any persisted
    /// calibration.
    #[must_use]
    pub fn new(store: Box<dyn CalibrationStore>, policy: CalibrationPolicy) -> Self {
        let cached = match store.load(STORE_KEY) {
            Ok(Some(blob)) => match serde_json::from_slice::<CalibrationResult>(&blob) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!(error = %e, "discarding unreadable persisted calibration");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "calibration store unavailable at startup");
                None
            }
        };

        Self {
            store,
            policy,
            active_session: None,
            cached,
            next_session_id: 1,
        }
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &CalibrationPolicy {
        &self.policy
    }

    /// Starts a calibration session.
    ///
    /// # Errors
    ///
    /// Fails with [`CalibrationError::CalibrationInProgress`] if a session is
    /// already active.
    pub fn start_calibration(
        &mut self,
        now: Timestamp,
    ) -> Result<CalibrationSession, CalibrationError> {
        if self.active_session.is_some() {
            return Err(CalibrationError::CalibrationInProgress);
        }
        let session = CalibrationSession {
            id: self.next_session_id,
            started_at: now,
        };
        self.next_session_id += 1;
        self.active_session = Some(session);
        info!(session = session.id, "calibration session started");
        Ok(session)
    }

    /// Abandons the active calibration session, if any.
    pub fn cancel_calibration(&mut self) {
        if let Some(session) = self.active_session.take() {
            info!(session = session.id, "calibration session cancelled");
        }
    }

    /// Certifies the given measurements against the policy floors, persists
    /// the result, and closes the session.
    ///
    /// # Errors
    ///
    /// Fails with the first violated floor (`AccuracyBelowThreshold`,
    /// `InsufficientStability`, `InsufficientCoverage`), with
    /// [`CalibrationError::UnknownSession`] for a stale session handle, or
    /// with a store error if persistence fails. On any failure no usable
    /// [`CalibrationResult`] is produced and any prior calibration is kept.
    pub fn complete_calibration(
        &mut self,
        session: CalibrationSession,
        measurements: &CalibrationMeasurements,
        now: Timestamp,
    ) -> Result<CalibrationResult, CalibrationError> {
        match self.active_session {
            Some(active) if active.id == session.id => {}
            _ => return Err(CalibrationError::UnknownSession(session.id)),
        }

        if measurements.accuracy < self.policy.min_accuracy {
            self.active_session = None;
            return Err(CalibrationError::AccuracyBelowThreshold {
                measured: measurements.accuracy,
                required: self.policy.min_accuracy,
            });
        }
        if measurements.stability < self.policy.min_stability {
            self.active_session = None;
            return Err(CalibrationError::InsufficientStability {
                measured: measurements.stability,
                required: self.policy.min_stability,
            });
        }
        if measurements.coverage < self.policy.min_coverage {
            self.active_session = None;
            return Err(CalibrationError::InsufficientCoverage {
                measured: measurements.coverage,
                required: self.policy.min_coverage,
            });
        }

        let result = CalibrationResult {
            accuracy: measurements.accuracy,
            stability: measurements.stability,
            coverage: measurements.coverage,
            transform: measurements.transform,
            expiry: self.policy.expiry,
            completed_at: now,
        };

        let blob = serde_json::to_vec(&result)
            .map_err(|e| CalibrationError::StoreError(e.to_string()))?;
        self.store.save(STORE_KEY, &blob)?;

        info!(
            session = session.id,
            accuracy = result.accuracy,
            stability = result.stability,
            coverage = result.coverage,
            "calibration certified"
        );

        self.active_session = None;
        self.cached = Some(result.clone());
        Ok(result)
    }

    /// True if no calibration exists or the stored one has expired at `now`.
    #[must_use]
    pub fn is_calibration_required(&self, now: Timestamp) -> bool {
        self.cached.as_ref().is_none_or(|c| c.is_expired(now))
    }

    /// Returns the current calibration if it exists and has not expired.
    ///
    /// # Errors
    ///
    /// Fails with [`CalibrationError::NotCalibrated`] or
    /// [`CalibrationError::CalibrationExpired`].
    pub fn valid_calibration(&self, now: Timestamp) -> Result<&CalibrationResult, CalibrationError> {
        let cached = self.cached.as_ref().ok_or(CalibrationError::NotCalibrated)?;
        if cached.is_expired(now) {
            return Err(CalibrationError::expired(cached.age(now), cached.expiry));
        }
        Ok(cached)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn good_measurements() -> CalibrationMeasurements {
        CalibrationMeasurements {
            accuracy: 0.99,
            stability: 0.97,
            coverage: 0.95,
            transform: PoseTransform::identity(),
        }
    }

    fn manager() -> CalibrationManager {
        CalibrationManager::new(Box::new(MemoryStore::new()), CalibrationPolicy::default())
    }

    #[test]
    fn fresh_manager_requires_calibration() {
        let m = manager();
        assert!(m.is_calibration_required(Timestamp::zero()));
        assert!(matches!(
            m.valid_calibration(Timestamp::zero()),
            Err(CalibrationError::NotCalibrated)
        ));
    }

    #[test]
    fn successful_calibration_cycle() {
        let mut m = manager();
        let session = m.start_calibration(Timestamp::zero()).unwrap();
        let result = m
            .complete_calibration(session, &good_measurements(), Timestamp::from_secs_f64(1.0))
            .unwrap();
        assert_eq!(result.accuracy, 0.99);
        assert!(!m.is_calibration_required(Timestamp::from_secs_f64(2.0)));
        assert!(m.valid_calibration(Timestamp::from_secs_f64(2.0)).is_ok());
    }

    #[test]
    fn accuracy_below_floor_fails_and_produces_nothing() {
        let mut m = manager();
        let session = m.start_calibration(Timestamp::zero()).unwrap();
        let mut measurements = good_measurements();
        measurements.accuracy = 0.97;

        let err = m
            .complete_calibration(session, &measurements, Timestamp::zero())
            .unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::AccuracyBelowThreshold { measured, .. } if measured == 0.97
        ));
        // No usable result may exist after the failure.
        assert!(m.is_calibration_required(Timestamp::zero()));
    }

    #[test]
    fn stability_and_coverage_floors() {
        let mut m = manager();

        let session = m.start_calibration(Timestamp::zero()).unwrap();
        let mut measurements = good_measurements();
        measurements.stability = 0.90;
        assert!(matches!(
            m.complete_calibration(session, &measurements, Timestamp::zero()),
            Err(CalibrationError::InsufficientStability { .. })
        ));

        let session = m.start_calibration(Timestamp::zero()).unwrap();
        let mut measurements = good_measurements();
        measurements.coverage = 0.80;
        assert!(matches!(
            m.complete_calibration(session, &measurements, Timestamp::zero()),
            Err(CalibrationError::InsufficientCoverage { .. })
        ));
    }

    #[test]
    fn concurrent_session_rejected() {
        let mut m = manager();
        let _session = m.start_calibration(Timestamp::zero()).unwrap();
        assert!(matches!(
            m.start_calibration(Timestamp::zero()),
            Err(CalibrationError::CalibrationInProgress)
        ));
    }

    #[test]
    fn cancel_frees_the_slot() {
        let mut m = manager();
        let _session = m.start_calibration(Timestamp::zero()).unwrap();
        m.cancel_calibration();
        assert!(m.start_calibration(Timestamp::zero()).is_ok());
    }

    #[test]
    fn stale_session_rejected() {
        let mut m = manager();
        let session = m.start_calibration(Timestamp::zero()).unwrap();
        m.cancel_calibration();
        assert!(matches!(
            m.complete_calibration(session, &good_measurements(), Timestamp::zero()),
            Err(CalibrationError::UnknownSession(_))
        ));
    }

    #[test]
    fn expiry_blocks_validity() {
        let mut m = CalibrationManager::new(
            Box::new(MemoryStore::new()),
            CalibrationPolicy::default().with_expiry(Duration::from_secs(60)),
        );
        let session = m.start_calibration(Timestamp::zero()).unwrap();
        m.complete_calibration(session, &good_measurements(), Timestamp::zero())
            .unwrap();

        assert!(m.valid_calibration(Timestamp::from_secs_f64(59.0)).is_ok());
        assert!(matches!(
            m.valid_calibration(Timestamp::from_secs_f64(61.0)),
            Err(CalibrationError::CalibrationExpired { .. })
        ));
        assert!(m.is_calibration_required(Timestamp::from_secs_f64(61.0)));
    }

    #[test]
    fn persisted_calibration_survives_restart() {
        let mut store = MemoryStore::new();
        {
            let mut m = CalibrationManager::new(
                Box::new(MemoryStore::new()),
                CalibrationPolicy::default(),
            );
            let session = m.start_calibration(Timestamp::zero()).unwrap();
            let result = m
                .complete_calibration(session, &good_measurements(), Timestamp::zero())
                .unwrap();
            let blob = serde_json::to_vec(&result).unwrap();
            store.save("calibration/active", &blob).unwrap();
        }

        let m = CalibrationManager::new(Box::new(store), CalibrationPolicy::default());
        assert!(!m.is_calibration_required(Timestamp::from_secs_f64(1.0)));
    }

    #[test]
    fn high_vibration_policy_is_shorter() {
        assert!(CalibrationPolicy::high_vibration().expiry < CalibrationPolicy::default().expiry);
    }
}
