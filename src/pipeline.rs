//! Objeto de sesión: encapsula estimadores, tracker, estado del enlace y
//! colaboradores, sin globals de proceso. Un ciclo de muestreo es un pase
//! síncrono completo; la latencia de rasterizar y clasificar extiende el
//! ciclo, no hay apropiación.

use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::classifier::{image_to_features, Classifier, Prediction};
use crate::display::{render_ascii, GestureDisplay};
use crate::fusion::{DriftEstimator, DriftParams, GravityEstimator, VelocityIntegrator};
use crate::imu::ImuBatch;
use crate::link::{CommandFrame, LinkCommand, StrokeStreamer};
use crate::orientation::OrientationIntegrator;
use crate::rasterizer::rasterize;
use crate::stroke_tracker::{StrokeTracker, TrackerParams};
use crate::types::{
    RASTER_CHANNELS, RASTER_HEIGHT, RASTER_SCALE, RASTER_WIDTH, SAMPLE_INTERVAL,
};
use crate::wire::StrokeWireRecord;

/// Parámetros de la sesión completa
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub tracker: TrackerParams,
    pub drift: DriftParams,
    /// Constante de tiempo del estimador de gravedad en segundos
    pub gravity_time_constant: f32,
    /// Ganancia de la corrección complementaria de orientación (1/s)
    pub orientation_gain: f32,
    /// Escalas del raster por eje
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            tracker: TrackerParams::default(),
            drift: DriftParams::default(),
            gravity_time_constant: 0.8,
            orientation_gain: 1.5,
            scale_x: RASTER_SCALE,
            scale_y: RASTER_SCALE,
        }
    }
}

/// Lo que pasó en un ciclo de muestreo
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Predicción del gesto completado en este ciclo (solo sin enlace)
    pub prediction: Option<Prediction>,
    /// Pulso de gesto completo
    pub done: bool,
    /// Se emitió una instantánea por el enlace
    pub streamed: bool,
}

/// Sesión de captura y clasificación de gestos
pub struct GestureSession {
    params: SessionParams,
    drift: DriftEstimator,
    gravity: GravityEstimator,
    orientation: OrientationIntegrator,
    velocity: VelocityIntegrator,
    tracker: StrokeTracker,
    streamer: StrokeStreamer,
    commands: Receiver<CommandFrame>,
    linked: bool,
    classifier: Box<dyn Classifier>,
    display: Box<dyn GestureDisplay>,
}

impl GestureSession {
    /// `commands` es el extremo consumidor del handoff SPSC con el hilo de
    /// recepción de bytes; `records` es el canal acotado de salida de
    /// instantáneas.
    pub fn new(
        params: SessionParams,
        commands: Receiver<CommandFrame>,
        records: Sender<StrokeWireRecord>,
        classifier: Box<dyn Classifier>,
        display: Box<dyn GestureDisplay>,
    ) -> Self {
        Self {
            drift: DriftEstimator::new(params.drift),
            gravity: GravityEstimator::new(params.gravity_time_constant),
            orientation: OrientationIntegrator::new(params.orientation_gain),
            velocity: VelocityIntegrator::new(),
            tracker: StrokeTracker::new(params.tracker.clone()),
            streamer: StrokeStreamer::new(records),
            commands,
            linked: false,
            classifier,
            display,
            params,
        }
    }

    pub fn linked(&self) -> bool {
        self.linked
    }

    pub fn tracker(&self) -> &StrokeTracker {
        &self.tracker
    }

    /// Un pase completo del ciclo de muestreo
    pub fn process_cycle(&mut self, batch: &ImuBatch) -> CycleReport {
        let mut report = CycleReport::default();

        self.drain_commands();

        if !batch.gyro.is_empty() {
            let mut rate_sum = 0.0;
            for raw in &batch.gyro {
                self.drift.update(raw);
                let corrected = self.drift.corrected(raw);
                rate_sum += corrected.magnitude();
                self.orientation
                    .integrate(&corrected, SAMPLE_INTERVAL, self.gravity.direction());
            }
            let rate_mag = rate_sum / batch.gyro.len() as f32;

            let step = self.tracker.update(
                self.orientation.quaternion(),
                rate_mag,
                self.velocity.magnitude(),
            );
            if step.started {
                self.velocity.reset();
            }
            report.done = step.done;

            report.streamed = self.streamer.on_cycle(self.linked, || {
                StrokeWireRecord::snapshot(
                    self.tracker.state_code(),
                    self.tracker.buffer().transmit_points(),
                )
            });
        }

        if !batch.accel.is_empty() {
            // Vertical predicha por la orientación, en el marco del dispositivo
            let predicted = self
                .orientation
                .quaternion()
                .conjugate()
                .rotate([0.0, 0.0, 1.0]);
            for raw in &batch.accel {
                self.gravity.update(raw, SAMPLE_INTERVAL, Some(predicted));
                self.velocity
                    .update(raw, self.gravity.vector(), SAMPLE_INTERVAL);
            }
        }

        // Con enlace activo el dispositivo actúa como periférico de
        // streaming; la rasterización y la clasificación corren solo en
        // modo autónomo.
        if report.done && !self.linked {
            report.prediction = self.classify_stroke();
        }

        report
    }

    fn drain_commands(&mut self) {
        while let Ok(frame) = self.commands.try_recv() {
            println!("[LINK] {}", frame.text());
            match LinkCommand::parse(&frame) {
                LinkCommand::LinkUp => self.linked = true,
                LinkCommand::LinkDown => self.linked = false,
                LinkCommand::Other(_) => {}
            }
        }
    }

    fn classify_stroke(&mut self) -> Option<Prediction> {
        let prep_started = Instant::now();
        let raster = rasterize(
            self.tracker.buffer().transmit_points(),
            self.params.scale_x,
            self.params.scale_y,
            RASTER_WIDTH,
            RASTER_HEIGHT,
            RASTER_CHANNELS,
        );
        print!(
            "{}",
            render_ascii(&raster, RASTER_WIDTH, RASTER_HEIGHT, RASTER_CHANNELS)
        );
        let features = image_to_features(&raster);
        let prep_ms = prep_started.elapsed().as_secs_f32() * 1000.0;

        match self.classifier.classify(&features) {
            Ok(mut pred) => {
                pred.timing.feature_ms = prep_ms;
                println!(
                    "🎯 {} ({:.1}%)  [prep: {:.1} ms, clasif: {:.1} ms]",
                    pred.label,
                    pred.score * 100.0,
                    pred.timing.feature_ms,
                    pred.timing.classification_ms
                );
                if let Some(anomaly) = pred.anomaly {
                    println!("   anomalía: {:.3}", anomaly);
                }
                self.display.show(
                    &pred.label,
                    &format!("{:.0}%", pred.score * 100.0),
                    "OK",
                );
                Some(pred)
            }
            Err(e) => {
                // El gesto se descarta; la sesión vuelve a Idle sola
                eprintln!("❌ Error clasificando: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierError, ClassifyTiming};
    use crate::imu::ImuBatch;
    use crate::link::CommandFramer;
    use crate::types::{ImuSample, LINK_END_MARKER, LINK_START_MARKER};
    use crossbeam_channel::{bounded, Sender};
    use std::sync::{Arc, Mutex};

    struct StubClassifier {
        fail: bool,
        calls: Arc<Mutex<usize>>,
    }

    impl Classifier for StubClassifier {
        fn classify(&mut self, _features: &[f32]) -> Result<Prediction, ClassifierError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(ClassifierError::InferenceStatus { status: 3 });
            }
            Ok(Prediction {
                label: "circulo".to_string(),
                score: 0.9,
                scores: vec![("circulo".to_string(), 0.9)],
                timing: ClassifyTiming::default(),
                anomaly: None,
            })
        }
    }

    struct SilentDisplay {
        shown: Arc<Mutex<Vec<String>>>,
    }

    impl GestureDisplay for SilentDisplay {
        fn show(&mut self, label: &str, _score: &str, _status: &str) {
            self.shown.lock().unwrap().push(label.to_string());
        }
    }

    struct Harness {
        session: GestureSession,
        cmd_tx: Sender<CommandFrame>,
        records: crossbeam_channel::Receiver<StrokeWireRecord>,
        calls: Arc<Mutex<usize>>,
        shown: Arc<Mutex<Vec<String>>>,
    }

    fn harness(fail_classifier: bool) -> Harness {
        let (cmd_tx, cmd_rx) = bounded(16);
        let (rec_tx, rec_rx) = bounded(64);
        let calls = Arc::new(Mutex::new(0));
        let shown = Arc::new(Mutex::new(Vec::new()));

        let params = SessionParams {
            tracker: TrackerParams {
                start_thr: 1.0,
                start_hold: 1,
                stop_thr: 0.2,
                stop_hold: 1,
                vel_weight: 0.0,
                min_len: 2,
            },
            ..SessionParams::default()
        };

        let session = GestureSession::new(
            params,
            cmd_rx,
            rec_tx,
            Box::new(StubClassifier {
                fail: fail_classifier,
                calls: Arc::clone(&calls),
            }),
            Box::new(SilentDisplay {
                shown: Arc::clone(&shown),
            }),
        );

        Harness {
            session,
            cmd_tx,
            records: rec_rx,
            calls,
            shown,
        }
    }

    fn send_command(tx: &Sender<CommandFrame>, payload: &[u8]) {
        let mut framer = CommandFramer::new();
        let mut bytes = LINK_START_MARKER.to_vec();
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&LINK_END_MARKER);
        for b in bytes {
            if let Some(frame) = framer.push_byte(b) {
                tx.send(frame).unwrap();
            }
        }
    }

    fn gyro_batch(rate: f32) -> ImuBatch {
        ImuBatch {
            gyro: vec![ImuSample::new(0.0, rate, 0.0, 0.0)],
            accel: Vec::new(),
        }
    }

    /// Movimiento alto seguido de quietud: un gesto completo
    fn run_gesture(session: &mut GestureSession, cycles: usize) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        for _ in 0..cycles {
            reports.push(session.process_cycle(&gyro_batch(2.0)));
        }
        for _ in 0..3 {
            reports.push(session.process_cycle(&gyro_batch(0.0)));
        }
        reports
    }

    #[test]
    fn test_link_commands_toggle_linked() {
        let mut h = harness(false);
        assert!(!h.session.linked());

        send_command(&h.cmd_tx, b"IND=BLECONNECTED");
        h.session.process_cycle(&ImuBatch::default());
        assert!(h.session.linked());

        // Una trama desconocida no cambia el estado
        send_command(&h.cmd_tx, b"IND=RSSI=-60");
        h.session.process_cycle(&ImuBatch::default());
        assert!(h.session.linked());

        send_command(&h.cmd_tx, b"IND=BLEDISCONNECTED");
        h.session.process_cycle(&ImuBatch::default());
        assert!(!h.session.linked());
    }

    #[test]
    fn test_gesture_classified_when_not_linked() {
        let mut h = harness(false);
        let reports = run_gesture(&mut h.session, 10);

        let done_cycles: Vec<_> = reports.iter().filter(|r| r.done).collect();
        assert_eq!(done_cycles.len(), 1);
        assert!(done_cycles[0].prediction.is_some());
        assert_eq!(*h.calls.lock().unwrap(), 1);
        assert_eq!(h.shown.lock().unwrap().as_slice(), ["circulo"]);
    }

    #[test]
    fn test_gesture_not_classified_while_linked() {
        let mut h = harness(false);
        send_command(&h.cmd_tx, b"IND=BLECONNECTED");

        let reports = run_gesture(&mut h.session, 10);

        // El pulso ocurre igual, pero sin rasterizar ni clasificar
        assert_eq!(reports.iter().filter(|r| r.done).count(), 1);
        assert!(reports.iter().all(|r| r.prediction.is_none()));
        assert_eq!(*h.calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_classifier_failure_skips_gesture() {
        let mut h = harness(true);
        let reports = run_gesture(&mut h.session, 10);

        assert_eq!(reports.iter().filter(|r| r.done).count(), 1);
        assert!(reports.iter().all(|r| r.prediction.is_none()));
        assert_eq!(*h.calls.lock().unwrap(), 1);

        // El fallo no detiene la sesión: el próximo gesto se procesa igual
        let reports = run_gesture(&mut h.session, 10);
        assert_eq!(reports.iter().filter(|r| r.done).count(), 1);
        assert_eq!(*h.calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_stream_cadence_while_linked() {
        let mut h = harness(false);
        send_command(&h.cmd_tx, b"IND=BLECONNECTED");

        for _ in 0..32 {
            h.session.process_cycle(&gyro_batch(2.0));
        }
        assert_eq!(h.records.len(), 2);

        let record = h.records.recv().unwrap();
        assert_eq!(record.encode().len(), crate::wire::RECORD_SIZE);
    }

    #[test]
    fn test_no_stream_without_link() {
        let mut h = harness(false);
        for _ in 0..32 {
            h.session.process_cycle(&gyro_batch(2.0));
        }
        assert!(h.records.is_empty());
    }

    #[test]
    fn test_empty_batch_is_harmless() {
        let mut h = harness(false);
        for _ in 0..10 {
            let report = h.session.process_cycle(&ImuBatch::default());
            assert!(!report.done);
            assert!(!report.streamed);
        }
    }
}
