//! Estimadores de deriva, gravedad y velocidad que alimentan la integración
//! de orientación y los disparadores del tracker.

use crate::types::ImuSample;

/// Parámetros del estimador de deriva del giroscopio
#[derive(Debug, Clone, Copy)]
pub struct DriftParams {
    /// Factor de suavizado por actualización (pasa-bajas lento)
    pub alpha: f32,
    /// Umbral de quietud en rad/s: solo se adapta por debajo de él
    pub stillness_thr: f32,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            alpha: 0.02,
            stillness_thr: 0.12,
        }
    }
}

/// Estimador del sesgo del giroscopio. Se adapta únicamente cuando el
/// residuo es pequeño: una estimación calculada durante rotación real
/// contaminaría la integración con señal legítima. Si el dispositivo nunca
/// queda quieto, la estimación conserva su valor previo.
pub struct DriftEstimator {
    params: DriftParams,
    bias: [f32; 3],
}

impl DriftEstimator {
    pub fn new(params: DriftParams) -> Self {
        Self {
            params,
            bias: [0.0; 3],
        }
    }

    pub fn bias(&self) -> [f32; 3] {
        self.bias
    }

    pub fn update(&mut self, raw: &ImuSample) {
        let rx = raw.x - self.bias[0];
        let ry = raw.y - self.bias[1];
        let rz = raw.z - self.bias[2];
        let residual = (rx * rx + ry * ry + rz * rz).sqrt();

        if residual < self.params.stillness_thr {
            let a = self.params.alpha;
            self.bias[0] += a * rx;
            self.bias[1] += a * ry;
            self.bias[2] += a * rz;
        }
    }

    /// Muestra corregida por el sesgo actual
    pub fn corrected(&self, raw: &ImuSample) -> ImuSample {
        ImuSample::new(
            raw.t,
            raw.x - self.bias[0],
            raw.y - self.bias[1],
            raw.z - self.bias[2],
        )
    }
}

/// Estimador de la dirección de gravedad: fusión complementaria entre la
/// dirección que predice la orientación y la lectura cruda del acelerómetro
/// (que mide gravedad más aceleración de movimiento). Expone el vector
/// fusionado (para compensar la aceleración antes de integrar velocidad) y
/// la dirección unitaria, renormalizada en cada actualización para que la
/// acumulación en punto flotante no la degrade.
pub struct GravityEstimator {
    /// Constante de tiempo del filtro en segundos
    time_constant: f32,
    ema: [f32; 3],
    direction: [f32; 3],
    initialized: bool,
}

impl GravityEstimator {
    /// `time_constant_secs` controla la reacción a datos nuevos; valores de
    /// 0.5–2.0 s funcionan bien en dispositivos de mano.
    pub fn new(time_constant_secs: f32) -> Self {
        Self {
            time_constant: time_constant_secs,
            ema: [0.0; 3],
            direction: [0.0, 0.0, 1.0],
            initialized: false,
        }
    }

    /// `predicted` es la dirección vertical unitaria que predice la
    /// orientación actual en el marco del dispositivo; cuando está, el
    /// previo del filtro gira hacia ella antes de mezclar la medición.
    pub fn update(&mut self, accel: &ImuSample, dt: f32, predicted: Option<[f32; 3]>) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        let alpha = dt / (self.time_constant + dt);
        if self.initialized {
            let prior = match predicted {
                Some(p) => {
                    // La predicción conserva la magnitud estimada
                    let mag = (self.ema[0] * self.ema[0]
                        + self.ema[1] * self.ema[1]
                        + self.ema[2] * self.ema[2])
                        .sqrt();
                    [p[0] * mag, p[1] * mag, p[2] * mag]
                }
                None => self.ema,
            };
            self.ema[0] = prior[0] * (1.0 - alpha) + accel.x * alpha;
            self.ema[1] = prior[1] * (1.0 - alpha) + accel.y * alpha;
            self.ema[2] = prior[2] * (1.0 - alpha) + accel.z * alpha;
        } else {
            self.ema = [accel.x, accel.y, accel.z];
            self.initialized = true;
        }

        let mag =
            (self.ema[0] * self.ema[0] + self.ema[1] * self.ema[1] + self.ema[2] * self.ema[2])
                .sqrt();
        if mag > 1e-6 {
            self.direction = [self.ema[0] / mag, self.ema[1] / mag, self.ema[2] / mag];
        }
        // Magnitud casi nula: se conserva la dirección previa
    }

    /// Vector EMA de gravedad en m/s², para compensación
    pub fn vector(&self) -> [f32; 3] {
        self.ema
    }

    /// Dirección unitaria de gravedad aparente en el marco del dispositivo,
    /// o `None` si todavía no llegó ninguna muestra.
    pub fn direction(&self) -> Option<[f32; 3]> {
        if self.initialized {
            Some(self.direction)
        } else {
            None
        }
    }
}

/// Integra la aceleración compensada por gravedad en una estimación de
/// velocidad. Solo sirve como señal para los disparadores del tracker y la
/// proyección de puntos: se reinicia al comenzar cada gesto, porque la
/// deriva de posición absoluta no tiene sentido físico en un gesto finito.
pub struct VelocityIntegrator {
    v: [f32; 3],
    prev: Option<[f32; 3]>,
}

impl VelocityIntegrator {
    pub fn new() -> Self {
        Self {
            v: [0.0; 3],
            prev: None,
        }
    }

    pub fn reset(&mut self) {
        self.v = [0.0; 3];
        self.prev = None;
    }

    /// Integración trapezoidal de `accel - gravity`
    pub fn update(&mut self, accel: &ImuSample, gravity: [f32; 3], dt: f32) {
        let comp = [
            accel.x - gravity[0],
            accel.y - gravity[1],
            accel.z - gravity[2],
        ];

        match self.prev {
            Some(p) => {
                self.v[0] += 0.5 * (comp[0] + p[0]) * dt;
                self.v[1] += 0.5 * (comp[1] + p[1]) * dt;
                self.v[2] += 0.5 * (comp[2] + p[2]) * dt;
            }
            None => {
                self.v[0] += comp[0] * dt;
                self.v[1] += comp[1] * dt;
                self.v[2] += comp[2] * dt;
            }
        }
        self.prev = Some(comp);
    }

    pub fn velocity(&self) -> [f32; 3] {
        self.v
    }

    pub fn magnitude(&self) -> f32 {
        (self.v[0] * self.v[0] + self.v[1] * self.v[1] + self.v[2] * self.v[2]).sqrt()
    }
}

impl Default for VelocityIntegrator {
    fn default() -> Self {
        Self::new()
    }
}
