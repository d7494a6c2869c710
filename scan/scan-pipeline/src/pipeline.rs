//! Scan session orchestration.
//!
//! `ScanPipeline` wires the injected calibration manager, the accumulator,
//! the live quality monitor, and the acquisition controller into one session
//! driver. All timing arrives through `Timestamp` arguments; the pipeline
//! never reads a wall clock.

use std::sync::Arc;

use scan_accumulate::{Accumulator, AccumulatorParams};
use scan_acquire::{
    AcquisitionMode, AcquisitionSession, ControllerParams, ControllerState, GuidanceEvent,
    ModeController,
};
use scan_calibrate::CalibrationManager;
use scan_features::{detect_features, FeatureParams};
use scan_postprocess::{postprocess, PostprocessParams, QualityWarning};
use scan_quality::{
    FinalizationThresholds, GateReport, QualityEstimate, QualityMonitor, SensorTelemetry,
};
use scan_reconstruct::{certify, reconstruct, ReconstructParams};
use scan_types::{
    CloudSnapshot, Duration, PointCloudFrame, QualityMetrics, ScanMesh, SensorProfile, Timestamp,
};
use tracing::info;

use crate::cache::{CacheKey, CacheStats, MeshCache};
use crate::error::{PipelineError, PipelineResult};
use crate::preview::{PreviewJob, PreviewOutcome};

/// Receives guidance events as the pipeline raises them.
///
/// The UI layer implements this; tests collect into a vector.
pub trait GuidanceSink {
    /// Called once per event, in emission order.
    fn emit(&mut self, event: &GuidanceEvent);
}

/// A sink that records every event.
#[derive(Debug, Default)]
pub struct CollectingSink {
    /// Events received so far.
    pub events: Vec<GuidanceEvent>,
}

impl GuidanceSink for CollectingSink {
    fn emit(&mut self, event: &GuidanceEvent) {
        self.events.push(*event);
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    /// Sensor profile for finalization-quality reconstruction.
    pub profile: SensorProfile,
    /// Sensor profile for preview reconstruction.
    pub preview_profile: SensorProfile,
    /// Acquisition controller tunables.
    pub controller: ControllerParams,
    /// Finalization acceptance gate.
    pub finalization: FinalizationThresholds,
    /// Solver parameters for finalization reconstruction.
    pub reconstruct: ReconstructParams,
    /// Solver parameters for preview reconstruction.
    pub preview_reconstruct: ReconstructParams,
    /// Post-processing stages for the finalized mesh.
    pub postprocess: PostprocessParams,
    /// Feature detection tunables.
    pub features: FeatureParams,
    /// Mesh cache entry ceiling.
    pub cache_entries: usize,
    /// Mesh cache byte ceiling.
    pub cache_bytes: usize,
    /// Rolling telemetry window for the quality monitor.
    pub quality_window: Duration,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            profile: SensorProfile::lidar_rated(),
            preview_profile: SensorProfile::preview(),
            controller: ControllerParams::default(),
            finalization: FinalizationThresholds::default(),
            reconstruct: ReconstructParams::default(),
            preview_reconstruct: ReconstructParams::preview(),
            postprocess: PostprocessParams::default(),
            features: FeatureParams::default(),
            cache_entries: 8,
            cache_bytes: 64 * 1024 * 1024,
            quality_window: Duration::from_secs(2),
        }
    }
}

/// Outcome of a successful finalization.
#[derive(Debug, Clone)]
pub struct FinalizeReport {
    /// The certified, post-processed mesh.
    pub mesh: Arc<ScanMesh>,
    /// Metrics measured on the delivered mesh.
    pub metrics: QualityMetrics,
    /// The gate evaluation (always passed here).
    pub gate: GateReport,
    /// Non-fatal post-processing warnings.
    pub warnings: Vec<QualityWarning>,
    /// Usable cloud samples reconstruction consumed.
    pub sample_count: usize,
    /// Features detected on the reconstructed surface.
    pub feature_count: usize,
    /// Where the mesh was cached.
    pub cache_key: CacheKey,
}

impl std::fmt::Display for FinalizeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "session {} rev {}: {} samples → {} vertices, {} faces; {}",
            self.cache_key.session,
            self.cache_key.revision,
            self.sample_count,
            self.mesh.vertex_count(),
            self.mesh.face_count(),
            self.metrics
        )
    }
}

/// The session driver.
///
/// Owns every service it orchestrates; the calibration store and guidance
/// sink are injected. One pipeline serves one scanner rig.
pub struct ScanPipeline {
    params: PipelineParams,
    calibration: CalibrationManager,
    controller: ModeController,
    monitor: QualityMonitor,
    accumulator: Option<Accumulator>,
    sink: Box<dyn GuidanceSink>,
    cache: MeshCache,
    preview: Option<PreviewJob>,
    preview_key: Option<CacheKey>,
    revision: u64,
}

impl ScanPipeline {
    /// Creates a pipeline around an injected calibration manager and sink.
    ///
    /// # Errors
    ///
    /// Returns the underlying validation error if any parameter set is
    /// out of range.
    pub fn new(
        calibration: CalibrationManager,
        params: PipelineParams,
        sink: Box<dyn GuidanceSink>,
    ) -> PipelineResult<Self> {
        params.reconstruct.validate()?;
        params.preview_reconstruct.validate()?;
        params.postprocess.validate()?;
        params.features.validate()?;
        let monitor = QualityMonitor::new(
            AcquisitionMode::Range.live_thresholds(),
            params.quality_window,
        )?;
        Ok(Self {
            controller: ModeController::new(params.controller, params.finalization.clone()),
            cache: MeshCache::new(params.cache_entries, params.cache_bytes),
            params,
            calibration,
            monitor,
            accumulator: None,
            sink,
            preview: None,
            preview_key: None,
            revision: 0,
        })
    }

    /// The calibration manager, for driving calibration flows.
    pub fn calibration_mut(&mut self) -> &mut CalibrationManager {
        &mut self.calibration
    }

    /// Current controller state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.controller.state()
    }

    /// The active session record, if any.
    #[must_use]
    pub fn session(&self) -> Option<&AcquisitionSession> {
        self.controller.session()
    }

    /// Cache activity counters.
    #[must_use]
    pub fn cache_stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    /// Looks up a cached mesh.
    pub fn cached(&mut self, key: CacheKey) -> Option<Arc<ScanMesh>> {
        self.cache.get(key)
    }

    /// True while a preview job is in flight.
    #[must_use]
    pub fn preview_in_flight(&self) -> bool {
        self.preview.is_some()
    }

    /// Starts a session in `mode` against the current calibration.
    ///
    /// # Errors
    ///
    /// Calibration must be present and unexpired, and the controller idle.
    pub fn start(&mut self, mode: AcquisitionMode, now: Timestamp) -> PipelineResult<u64> {
        let calibration = self.calibration.valid_calibration(now)?.clone();
        let session = self.controller.start(mode, &calibration, now)?;
        let id = session.id;
        self.accumulator = Some(Accumulator::new(
            AccumulatorParams::from_profile(&self.params.profile),
            calibration.transform,
        )?);
        self.monitor.set_thresholds(mode.live_thresholds());
        self.monitor.reset();
        self.revision = 0;
        info!(session = id, ?mode, "scan session started");
        Ok(id)
    }

    /// Ingests one sensor frame and runs a quality evaluation over the
    /// accumulated cloud.
    ///
    /// Guidance raised by the evaluation goes to the sink. The estimate is
    /// returned for display.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotActive`] unless acquisition is active. When this
    /// evaluation spends the last of the retry budget, the guidance is still
    /// emitted and [`scan_acquire::AcquireError::QualityThresholdNotMet`]
    /// is returned.
    pub fn ingest_frame(
        &mut self,
        frame: &PointCloudFrame,
        telemetry: SensorTelemetry,
        now: Timestamp,
    ) -> PipelineResult<QualityEstimate> {
        if !matches!(self.controller.state(), ControllerState::Active(_)) {
            return Err(PipelineError::NotActive);
        }
        let accumulator = self.accumulator.as_mut().ok_or(PipelineError::NotActive)?;
        accumulator.ingest(frame);
        let snapshot = accumulator.snapshot(now);
        let estimate = self.monitor.evaluate(&snapshot, telemetry);
        let events = self.controller.on_quality(&estimate, now);
        self.emit_all(&events);
        self.sync_thresholds();
        if let Some(failure) = self.controller.failure() {
            return Err(failure.into());
        }
        Ok(estimate)
    }

    /// Advances deadline-driven controller transitions.
    pub fn tick(&mut self, now: Timestamp) {
        let events = self.controller.tick(now);
        self.emit_all(&events);
        self.sync_thresholds();
    }

    /// An immutable snapshot of the accumulated cloud.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotActive`] without a session.
    pub fn snapshot(&self, now: Timestamp) -> PipelineResult<CloudSnapshot> {
        let accumulator = self.accumulator.as_ref().ok_or(PipelineError::NotActive)?;
        Ok(accumulator.snapshot(now))
    }

    /// Kicks off a preview reconstruction on a worker thread.
    ///
    /// Any previous in-flight preview is cancelled and abandoned first.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotActive`] without a session.
    pub fn request_preview(&mut self, now: Timestamp) -> PipelineResult<()> {
        let snapshot = self.snapshot(now)?;
        if let Some(job) = self.preview.take() {
            job.abandon();
        }
        self.revision += 1;
        self.preview_key = Some(CacheKey {
            session: self.session_id(),
            revision: self.revision,
        });
        self.preview = Some(PreviewJob::spawn(
            snapshot,
            self.params.preview_profile.clone(),
            self.params.preview_reconstruct.clone(),
        ));
        Ok(())
    }

    /// Collects a finished preview, caching and returning its mesh.
    ///
    /// `None` while the job is still running, after cancellation, or when no
    /// preview was requested. A preview that failed reconstruction surfaces
    /// its error once.
    pub fn poll_preview(&mut self) -> Option<PipelineResult<Arc<ScanMesh>>> {
        let mut job = self.preview.take()?;
        let Some(outcome) = job.try_take() else {
            self.preview = Some(job);
            return None;
        };
        let key = self.preview_key.take();
        match outcome {
            PreviewOutcome::Completed(report) => {
                let mesh = Arc::new(report.mesh);
                if let Some(key) = key {
                    self.cache.insert(key, Arc::clone(&mesh));
                }
                Some(Ok(mesh))
            }
            PreviewOutcome::Cancelled => None,
            PreviewOutcome::Failed(e) => Some(Err(e.into())),
        }
    }

    /// Reconstructs at full quality, post-processes, gates, and completes
    /// the session.
    ///
    /// Any in-flight preview is cancelled without being awaited. On gate
    /// failure the mesh is discarded, the controller recovers, and
    /// [`PipelineError::GateFailed`] is returned.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotReadyToFinalize`] unless the last live evaluation
    /// was at least `Good`; component errors pass through.
    pub fn finalize(&mut self, now: Timestamp) -> PipelineResult<FinalizeReport> {
        if let Some(job) = self.preview.take() {
            job.abandon();
        }
        self.preview_key = None;
        if !self.controller.can_attempt_finalize() {
            return Err(PipelineError::NotReadyToFinalize);
        }
        let accumulator = self.accumulator.as_ref().ok_or(PipelineError::NotActive)?;
        let snapshot = accumulator.snapshot(now);

        let recon = reconstruct(&snapshot, &self.params.profile, &self.params.reconstruct)?;
        let features = detect_features(&recon.mesh, &self.params.features)?;
        let post = postprocess(&recon.mesh, &features, &self.params.postprocess)?;

        let mut metrics = certify(&snapshot, &post.mesh, self.params.profile.min_edge_length);
        metrics.feature_preservation = post.feature_preservation;

        let gate = self.controller.finalization_thresholds().gate(&metrics);
        let events = self.controller.finalize_outcome(&gate, now)?;
        self.emit_all(&events);
        if !gate.passed {
            // A rejection that spends the last retry outranks the gate error.
            if let Some(failure) = self.controller.failure() {
                return Err(failure.into());
            }
            return Err(PipelineError::GateFailed(gate));
        }

        self.revision += 1;
        let key = CacheKey {
            session: self.session_id(),
            revision: self.revision,
        };
        let mut mesh = post.mesh;
        mesh.metrics = Some(metrics);
        let mesh = Arc::new(mesh);
        self.cache.insert(key, Arc::clone(&mesh));

        let report = FinalizeReport {
            mesh,
            metrics,
            gate,
            warnings: post.warnings,
            sample_count: recon.sample_count,
            feature_count: features.len(),
            cache_key: key,
        };
        info!("{report}");
        Ok(report)
    }

    /// Interrupts the session, cancelling timers and any preview.
    ///
    /// # Errors
    ///
    /// Controller errors pass through.
    pub fn interrupt(&mut self) -> PipelineResult<()> {
        self.controller.interrupt()?;
        if let Some(job) = self.preview.take() {
            job.abandon();
        }
        self.preview_key = None;
        Ok(())
    }

    /// Resumes an interrupted session, re-validating its calibration.
    ///
    /// # Errors
    ///
    /// Controller errors pass through, including `CalibrationExpired`.
    pub fn resume(&mut self, now: Timestamp) -> PipelineResult<AcquisitionMode> {
        let mode = self.controller.resume(now)?;
        self.monitor.set_thresholds(mode.live_thresholds());
        self.monitor.reset();
        Ok(mode)
    }

    /// Abandons the session entirely. The cloud and preview are dropped;
    /// cached meshes survive.
    pub fn abort(&mut self) {
        self.controller.abort();
        self.accumulator = None;
        if let Some(job) = self.preview.take() {
            job.abandon();
        }
        self.preview_key = None;
        self.monitor.reset();
    }

    fn emit_all(&mut self, events: &[GuidanceEvent]) {
        for event in events {
            self.sink.emit(event);
        }
    }

    fn sync_thresholds(&mut self) {
        if let ControllerState::Active(mode) = self.controller.state() {
            self.monitor.set_thresholds(mode.live_thresholds());
        }
    }

    fn session_id(&self) -> u64 {
        self.controller.session().map_or(0, |s| s.id)
    }
}

impl std::fmt::Debug for ScanPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanPipeline")
            .field("state", &self.controller.state())
            .field("revision", &self.revision)
            .field("preview_in_flight", &self.preview.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};
    use scan_acquire::AcquireError;
    use scan_calibrate::{CalibrationMeasurements, CalibrationPolicy, MemoryStore};
    use scan_quality::QualityStatus;
    use scan_types::{PointSample, PoseTransform, SourceModality};

    /// Small dense dome patch tuned so live density lands in the Good band.
    fn test_profile() -> SensorProfile {
        SensorProfile {
            name: "test-rig",
            max_octree_depth: 5,
            samples_per_node: 24,
            point_weight: 4.0,
            min_edge_length: 0.2,
            confidence_floor: 0.3,
            merge_radius: 0.1,
            min_point_count: 100,
            rated_density: 1000.0,
        }
    }

    fn relaxed_gate() -> FinalizationThresholds {
        FinalizationThresholds {
            min_density: 0.0,
            min_completeness: 0.0,
            max_noise: f64::INFINITY,
            min_feature_preservation: 0.0,
            min_normal_consistency: 0.0,
        }
    }

    fn test_params(finalization: FinalizationThresholds) -> PipelineParams {
        PipelineParams {
            profile: test_profile(),
            preview_profile: test_profile(),
            finalization,
            preview_reconstruct: ReconstructParams::preview(),
            ..PipelineParams::default()
        }
    }

    /// 20 mm × 20 mm dome patch, `n` × `n` samples, at `t`.
    fn dome_frame(n: usize, t: Timestamp) -> PointCloudFrame {
        let mut samples = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                let x = -10.0 + 20.0 * i as f64 / (n - 1) as f64;
                let y = -10.0 + 20.0 * j as f64 / (n - 1) as f64;
                let z = 5.0 - (x * x + y * y) / 80.0;
                samples.push(PointSample::new(
                    Point3::new(x, y, z),
                    0.9,
                    SourceModality::Range,
                    t,
                ));
            }
        }
        PointCloudFrame::new(samples, PoseTransform::identity(), t)
    }

    fn telemetry(step: u64, t: Timestamp) -> SensorTelemetry {
        SensorTelemetry {
            pose: PoseTransform::from_translation(Vector3::new(0.1 * step as f64, 0.0, 0.0)),
            ambient_lux: 500.0,
            feature_confidence: None,
            timestamp: t,
        }
    }

    fn calibrated_manager() -> CalibrationManager {
        let mut manager =
            CalibrationManager::new(Box::new(MemoryStore::new()), CalibrationPolicy::default());
        let session = manager.start_calibration(Timestamp::zero()).unwrap();
        manager
            .complete_calibration(
                session,
                &CalibrationMeasurements {
                    accuracy: 0.99,
                    stability: 0.97,
                    coverage: 0.95,
                    transform: PoseTransform::identity(),
                },
                Timestamp::zero(),
            )
            .unwrap();
        manager
    }

    fn pipeline_with(gate: FinalizationThresholds) -> ScanPipeline {
        ScanPipeline::new(
            calibrated_manager(),
            test_params(gate),
            Box::new(CollectingSink::default()),
        )
        .unwrap()
    }

    /// Drives ingest until the live estimate reaches `Good`.
    fn ingest_until_good(pipeline: &mut ScanPipeline) -> Timestamp {
        let mut last = Timestamp::zero();
        for step in 0..3_u64 {
            let t = Timestamp::from_millis(100 * (step + 1));
            let frame = dome_frame(50, t);
            let estimate = pipeline
                .ingest_frame(&frame, telemetry(step, t), t)
                .unwrap();
            last = t;
            if step == 2 {
                assert_eq!(estimate.status, QualityStatus::Good);
            }
        }
        last
    }

    #[test]
    fn start_requires_calibration() {
        let manager =
            CalibrationManager::new(Box::new(MemoryStore::new()), CalibrationPolicy::default());
        let mut pipeline = ScanPipeline::new(
            manager,
            test_params(relaxed_gate()),
            Box::new(CollectingSink::default()),
        )
        .unwrap();
        let err = pipeline
            .start(AcquisitionMode::Range, Timestamp::zero())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Calibration(_)));
    }

    #[test]
    fn full_session_finalizes() {
        let mut pipeline = pipeline_with(relaxed_gate());
        pipeline
            .start(AcquisitionMode::Range, Timestamp::zero())
            .unwrap();
        let t = ingest_until_good(&mut pipeline);

        let report = pipeline.finalize(t).unwrap();
        assert!(report.gate.passed);
        assert!(!report.mesh.is_empty());
        assert_eq!(pipeline.state(), ControllerState::Completed);
        assert!(pipeline.cached(report.cache_key).is_some());
    }

    #[test]
    fn gate_failure_recovers_session() {
        let impossible = FinalizationThresholds {
            min_density: 1e9,
            ..relaxed_gate()
        };
        let mut pipeline = pipeline_with(impossible);
        pipeline
            .start(AcquisitionMode::Range, Timestamp::zero())
            .unwrap();
        let t = ingest_until_good(&mut pipeline);

        let err = pipeline.finalize(t).unwrap_err();
        assert!(matches!(err, PipelineError::GateFailed(_)));
        assert_eq!(pipeline.state(), ControllerState::Recovering);
    }

    #[test]
    fn finalize_refused_without_good_quality() {
        let mut pipeline = pipeline_with(relaxed_gate());
        pipeline
            .start(AcquisitionMode::Range, Timestamp::zero())
            .unwrap();
        let err = pipeline.finalize(Timestamp::from_millis(10)).unwrap_err();
        assert!(matches!(err, PipelineError::NotReadyToFinalize));
    }

    #[test]
    fn finalize_cancels_preview() {
        let mut pipeline = pipeline_with(relaxed_gate());
        pipeline
            .start(AcquisitionMode::Range, Timestamp::zero())
            .unwrap();
        let t = ingest_until_good(&mut pipeline);
        pipeline.request_preview(t).unwrap();
        assert!(pipeline.preview_in_flight());

        pipeline.finalize(t).unwrap();
        assert!(!pipeline.preview_in_flight());
    }

    #[test]
    fn preview_completes_and_caches() {
        let mut pipeline = pipeline_with(relaxed_gate());
        pipeline
            .start(AcquisitionMode::Range, Timestamp::zero())
            .unwrap();
        let t = ingest_until_good(&mut pipeline);
        pipeline.request_preview(t).unwrap();

        let mut mesh = None;
        for _ in 0..600 {
            if let Some(result) = pipeline.poll_preview() {
                mesh = Some(result.unwrap());
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        let mesh = mesh.expect("preview did not finish");
        assert!(!mesh.is_empty());
        let key = CacheKey {
            session: 1,
            revision: 1,
        };
        assert!(pipeline.cached(key).is_some());
    }

    #[test]
    fn exhausted_retries_surface_typed_error() {
        let mut pipeline = pipeline_with(relaxed_gate());
        pipeline
            .start(AcquisitionMode::Range, Timestamp::zero())
            .unwrap();
        let mut now = Timestamp::zero();
        let mut step = 0_u64;
        // Sparse frames keep density in the Poor band; each debounce trip
        // spends one recovery, and the fourth exhausts the budget.
        let err = loop {
            assert!(step < 200, "retry budget never ran out");
            step += 1;
            now = now.saturating_add(Duration::from_millis(100));
            match pipeline.state() {
                ControllerState::Active(_) => {
                    let frame = dome_frame(4, now);
                    match pipeline.ingest_frame(&frame, telemetry(step, now), now) {
                        Ok(_) => {}
                        Err(e) => break e,
                    }
                }
                ControllerState::Recovering => {
                    now = now.saturating_add(Duration::from_secs(60));
                    pipeline.tick(now);
                }
                state => panic!("unexpected state {state:?}"),
            }
        };
        assert!(matches!(
            err,
            PipelineError::Acquire(AcquireError::QualityThresholdNotMet { retries: 3 })
        ));
        assert_eq!(pipeline.state(), ControllerState::Failed);
    }

    /// 2,025-sample patch over 5 cm × 5 cm, the sensor's rated 80 pts/cm².
    fn rated_patch_snapshot() -> CloudSnapshot {
        let n = 45;
        let mut samples = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                let x = 50.0 * i as f64 / (n - 1) as f64;
                let y = 50.0 * j as f64 / (n - 1) as f64;
                let z = 5.0 - ((x - 25.0).powi(2) + (y - 25.0).powi(2)) / 250.0;
                samples.push(PointSample::new(
                    Point3::new(x, y, z),
                    0.9,
                    SourceModality::Range,
                    Timestamp::zero(),
                ));
            }
        }
        CloudSnapshot::new(samples, n * n, 0, Timestamp::zero())
    }

    #[test]
    fn rated_density_patch_meets_completeness_and_edge_floor() {
        let profile = SensorProfile {
            name: "patch-rig",
            max_octree_depth: 5,
            samples_per_node: 8,
            point_weight: 4.0,
            min_edge_length: 2.0,
            confidence_floor: 0.3,
            merge_radius: 0.1,
            min_point_count: 500,
            rated_density: 80.0,
        };
        // Padding sized so the extraction grid pitch lands just above the
        // 2 mm edge floor.
        let params = ReconstructParams {
            bounds_padding: 0.45,
            ..ReconstructParams::default()
        };
        let report = reconstruct(&rated_patch_snapshot(), &profile, &params).unwrap();
        assert!(report.mesh.face_count() > 0);
        assert!(
            report.metrics.surface_completeness >= 0.95,
            "completeness {}",
            report.metrics.surface_completeness
        );
        assert!(report.mesh.min_edge_length().unwrap() >= 2.0);
    }

    #[test]
    fn interrupt_and_resume() {
        let mut pipeline = pipeline_with(relaxed_gate());
        pipeline
            .start(AcquisitionMode::Range, Timestamp::zero())
            .unwrap();
        ingest_until_good(&mut pipeline);

        pipeline.interrupt().unwrap();
        assert_eq!(pipeline.state(), ControllerState::Idle);

        let mode = pipeline.resume(Timestamp::from_millis(500)).unwrap();
        assert_eq!(mode, AcquisitionMode::Range);
        assert!(matches!(pipeline.state(), ControllerState::Active(_)));
    }

    #[test]
    fn ingest_requires_active_session() {
        let mut pipeline = pipeline_with(relaxed_gate());
        let t = Timestamp::from_millis(1);
        let err = pipeline
            .ingest_frame(&dome_frame(4, t), telemetry(0, t), t)
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotActive));
    }

    #[test]
    fn abort_clears_session_but_keeps_cache() {
        let mut pipeline = pipeline_with(relaxed_gate());
        pipeline
            .start(AcquisitionMode::Range, Timestamp::zero())
            .unwrap();
        let t = ingest_until_good(&mut pipeline);
        let report = pipeline.finalize(t).unwrap();

        pipeline.abort();
        assert_eq!(pipeline.state(), ControllerState::Idle);
        assert!(pipeline.session().is_none());
        assert!(pipeline.cached(report.cache_key).is_some());
    }
}
