use crate::orientation::Quaternion;
use crate::types::{StrokePoint, STROKE_CAPACITY, TRANSMIT_STRIDE};

/// Parámetros de disparo del tracker. Los valores exactos son un asunto de
/// calibración empírica: se inyectan, nunca se cablean.
#[derive(Debug, Clone)]
pub struct TrackerParams {
    /// Nivel de movimiento para iniciar captura (default: 0.35)
    pub start_thr: f32,
    /// Ciclos consecutivos sobre el umbral para iniciar (default: 3)
    pub start_hold: usize,
    /// Nivel de movimiento para terminar captura (default: 0.15)
    pub stop_thr: f32,
    /// Ciclos consecutivos bajo el umbral para terminar (default: 12)
    pub stop_hold: usize,
    /// Peso de la magnitud de velocidad en el nivel de movimiento (default: 0.5)
    pub vel_weight: f32,
    /// Mínimo de puntos para considerar el trazo válido (default: 6)
    pub min_len: usize,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            start_thr: 0.35,
            start_hold: 3,
            stop_thr: 0.15,
            stop_hold: 12,
            vel_weight: 0.5,
            min_len: 6,
        }
    }
}

/// Estados de la máquina de estados del tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Esperando movimiento sostenido
    Idle,
    /// Acumulando puntos del trazo
    Tracking,
    /// Gesto completo; dura exactamente un ciclo
    Done,
}

/// Buffer acotado de puntos del trazo. `transmit_len` marca cuántos puntos
/// son válidos para rasterizar o transmitir; invariante
/// `0 <= transmit_len <= len <= capacidad`.
pub struct StrokeBuffer {
    points: Vec<StrokePoint>,
    transmit_len: usize,
}

impl StrokeBuffer {
    pub fn new() -> Self {
        Self {
            points: Vec::with_capacity(STROKE_CAPACITY),
            transmit_len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn transmit_len(&self) -> usize {
        self.transmit_len
    }

    pub fn points(&self) -> &[StrokePoint] {
        &self.points
    }

    /// Puntos válidos para rasterizar o transmitir
    pub fn transmit_points(&self) -> &[StrokePoint] {
        &self.points[..self.transmit_len]
    }

    /// Reinicio lógico: longitud 0, sin borrar memoria
    pub fn clear(&mut self) {
        self.points.clear();
        self.transmit_len = 0;
    }

    /// Agrega un punto si hay lugar. A capacidad llena los puntos nuevos se
    /// descartan: truncar el final del gesto daña menos que corromper su
    /// inicio. Durante la captura `transmit_len` avanza solo por pares
    /// completos.
    fn push(&mut self, p: StrokePoint) -> bool {
        if self.points.len() >= STROKE_CAPACITY {
            return false;
        }
        self.points.push(p);
        self.transmit_len = self.points.len() - self.points.len() % TRANSMIT_STRIDE;
        true
    }

    fn finish(&mut self) {
        self.transmit_len = self.points.len();
    }
}

impl Default for StrokeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Resultado de un ciclo del tracker
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackerStep {
    /// Transición Idle→Tracking en este ciclo (reiniciar velocidad)
    pub started: bool,
    /// Pulso one-shot de gesto completo; los consumidores deben leerlo
    /// exactamente una vez
    pub done: bool,
}

/// Máquina de estados de captura del trazo. Detecta inicio y fin del gesto
/// a partir del nivel de movimiento y acumula la proyección yaw/pitch de la
/// orientación relativa al origen del trazo.
pub struct StrokeTracker {
    params: TrackerParams,
    state: State,
    origin: Quaternion,
    buffer: StrokeBuffer,
    above_cnt: usize,
    below_cnt: usize,
    stop_requested: bool,
}

impl StrokeTracker {
    pub fn new(params: TrackerParams) -> Self {
        Self {
            params,
            state: State::Idle,
            origin: Quaternion::identity(),
            buffer: StrokeBuffer::new(),
            above_cnt: 0,
            below_cnt: 0,
            stop_requested: false,
        }
    }

    pub fn buffer(&self) -> &StrokeBuffer {
        &self.buffer
    }

    /// Señal externa de fin de gesto; surte efecto en el próximo ciclo
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Reinicia el trazo en vuelo sin emitir pulso (un solo gesto puede
    /// estar en vuelo; no se encolan gestos concurrentes)
    pub fn restart(&mut self, orientation: Quaternion) {
        if self.state == State::Tracking {
            self.buffer.clear();
            self.origin = orientation;
        }
    }

    /// Avanza un ciclo. `rate_mag` es la magnitud de la velocidad angular
    /// corregida por deriva y `vel_mag` la de la velocidad integrada.
    pub fn update(&mut self, orientation: Quaternion, rate_mag: f32, vel_mag: f32) -> TrackerStep {
        let mut step = TrackerStep::default();
        let motion = rate_mag + self.params.vel_weight * vel_mag;

        // Done dura exactamente un ciclo; al siguiente vuelve a Idle
        if self.state == State::Done {
            self.state = State::Idle;
            self.above_cnt = 0;
        }

        match self.state {
            State::Idle => {
                if motion >= self.params.start_thr {
                    self.above_cnt += 1;
                } else {
                    self.above_cnt = 0;
                }

                if self.above_cnt >= self.params.start_hold {
                    self.state = State::Tracking;
                    self.above_cnt = 0;
                    self.below_cnt = 0;
                    self.stop_requested = false;
                    self.origin = orientation;
                    self.buffer.clear();
                    step.started = true;
                    self.buffer.push(self.project(orientation));
                }
            }

            State::Tracking => {
                if motion < self.params.stop_thr {
                    self.below_cnt += 1;
                } else {
                    self.below_cnt = 0;
                }

                if self.below_cnt >= self.params.stop_hold || self.stop_requested {
                    self.below_cnt = 0;
                    self.stop_requested = false;

                    if self.buffer.len() >= self.params.min_len {
                        self.state = State::Done;
                        self.buffer.finish();
                        step.done = true;
                    } else {
                        // Demasiado corto: se abandona sin pulso
                        self.state = State::Idle;
                        self.buffer.clear();
                    }
                } else {
                    self.buffer.push(self.project(orientation));
                }
            }

            State::Done => unreachable!(),
        }

        step
    }

    fn project(&self, orientation: Quaternion) -> StrokePoint {
        let delta = self.origin.conjugate().mul(orientation).normalized();
        StrokePoint {
            x: delta.yaw(),
            y: delta.pitch(),
        }
    }

    /// Código de estado para el registro de cable
    pub fn state_code(&self) -> i32 {
        match self.state {
            State::Idle => 0,
            State::Tracking => 1,
            State::Done => 2,
        }
    }

    /// Estado actual del tracker (para depuración)
    pub fn state(&self) -> &str {
        match self.state {
            State::Idle => "IDLE",
            State::Tracking => "TRACKING",
            State::Done => "DONE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_params() -> TrackerParams {
        TrackerParams {
            start_thr: 1.0,
            start_hold: 1,
            stop_thr: 0.2,
            stop_hold: 1,
            vel_weight: 0.0,
            min_len: 2,
        }
    }

    fn run_gesture(tracker: &mut StrokeTracker, high_cycles: usize) -> usize {
        let q = Quaternion::identity();
        let mut pulses = 0;

        for _ in 0..high_cycles {
            if tracker.update(q, 2.0, 0.0).done {
                pulses += 1;
            }
        }
        // Dos ciclos de quietud: uno dispara el fin, otro drena Done
        for _ in 0..2 {
            if tracker.update(q, 0.0, 0.0).done {
                pulses += 1;
            }
        }
        pulses
    }

    #[test]
    fn test_idle_to_tracking() {
        let mut tracker = StrokeTracker::new(quick_params());
        assert_eq!(tracker.state(), "IDLE");

        let step = tracker.update(Quaternion::identity(), 2.0, 0.0);
        assert!(step.started);
        assert_eq!(tracker.state(), "TRACKING");
        assert_eq!(tracker.buffer().len(), 1);
    }

    #[test]
    fn test_capture_length_and_single_pulse() {
        // k ciclos de movimiento alto → k puntos y exactamente un pulso
        let mut tracker = StrokeTracker::new(quick_params());
        let k = 10;
        let pulses = run_gesture(&mut tracker, k);

        assert_eq!(pulses, 1);
        assert_eq!(tracker.buffer().len(), k);
        assert_eq!(tracker.buffer().transmit_len(), k);
        assert_eq!(tracker.state(), "IDLE");
    }

    #[test]
    fn test_buffer_resets_on_next_start() {
        let mut tracker = StrokeTracker::new(quick_params());
        run_gesture(&mut tracker, 10);
        assert_eq!(tracker.buffer().len(), 10);

        // El próximo inicio reinicia la longitud a 0 antes de acumular
        let step = tracker.update(Quaternion::identity(), 2.0, 0.0);
        assert!(step.started);
        assert_eq!(tracker.buffer().len(), 1);
    }

    #[test]
    fn test_capacity_drops_tail_not_head() {
        let mut tracker = StrokeTracker::new(quick_params());
        let q = Quaternion::identity();

        for _ in 0..(STROKE_CAPACITY + 40) {
            tracker.update(q, 2.0, 0.0);
        }

        // A capacidad llena se descartan los nuevos, no los primeros
        assert_eq!(tracker.buffer().len(), STROKE_CAPACITY);
        assert_eq!(tracker.state(), "TRACKING");
    }

    #[test]
    fn test_short_stroke_abandoned_without_pulse() {
        let mut tracker = StrokeTracker::new(TrackerParams {
            min_len: 8,
            ..quick_params()
        });
        let pulses = run_gesture(&mut tracker, 3);

        assert_eq!(pulses, 0);
        assert_eq!(tracker.state(), "IDLE");
        assert!(tracker.buffer().is_empty());
    }

    #[test]
    fn test_transmit_len_advances_by_pairs_while_tracking() {
        let mut tracker = StrokeTracker::new(quick_params());
        let q = Quaternion::identity();

        for _ in 0..5 {
            tracker.update(q, 2.0, 0.0);
        }

        assert_eq!(tracker.buffer().len(), 5);
        assert_eq!(tracker.buffer().transmit_len(), 4);
    }

    #[test]
    fn test_start_hold_filters_spikes() {
        let mut tracker = StrokeTracker::new(TrackerParams {
            start_hold: 3,
            ..quick_params()
        });
        let q = Quaternion::identity();

        // Un pico aislado no inicia captura
        tracker.update(q, 5.0, 0.0);
        tracker.update(q, 0.0, 0.0);
        assert_eq!(tracker.state(), "IDLE");

        for _ in 0..3 {
            tracker.update(q, 5.0, 0.0);
        }
        assert_eq!(tracker.state(), "TRACKING");
    }

    #[test]
    fn test_explicit_stop_request() {
        let mut tracker = StrokeTracker::new(TrackerParams {
            stop_hold: 1000,
            ..quick_params()
        });
        let q = Quaternion::identity();

        for _ in 0..10 {
            tracker.update(q, 2.0, 0.0);
        }
        tracker.request_stop();
        let step = tracker.update(q, 2.0, 0.0);
        assert!(step.done);
        assert_eq!(tracker.state(), "DONE");
    }

    #[test]
    fn test_done_lasts_exactly_one_cycle() {
        let mut tracker = StrokeTracker::new(quick_params());
        let q = Quaternion::identity();

        for _ in 0..10 {
            tracker.update(q, 2.0, 0.0);
        }
        let step = tracker.update(q, 0.0, 0.0);
        assert!(step.done);
        assert_eq!(tracker.state_code(), 2);

        let step = tracker.update(q, 0.0, 0.0);
        assert!(!step.done);
        assert_eq!(tracker.state_code(), 0);
    }
}
