use crate::types::ImuSample;

#[derive(Clone, Copy, Debug)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Rotación nula
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    pub fn normalized(self) -> Self {
        let norm = (self.w * self.w
            + self.x * self.x
            + self.y * self.y
            + self.z * self.z)
            .sqrt()
            .max(1e-9);

        let mut q = Self {
            w: self.w / norm,
            x: self.x / norm,
            y: self.y / norm,
            z: self.z / norm,
        };

        // Force a canonical representation (w >= 0) to avoid sudden flips between q and -q
        if q.w < 0.0 {
            q.w = -q.w;
            q.x = -q.x;
            q.y = -q.y;
            q.z = -q.z;
        }

        q
    }

    pub fn conjugate(self) -> Self {
        Self {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    pub fn mul(self, rhs: Self) -> Self {
        Self {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }

    /// Rota un vector: r = q · v · q*
    pub fn rotate(self, v: [f32; 3]) -> [f32; 3] {
        let vq = Self::new(0.0, v[0], v[1], v[2]);
        let r = self.mul(vq).mul(self.conjugate());
        [r.x, r.y, r.z]
    }

    /// Cuaternión incremental de ángulo pequeño para una rotación ω·dt
    pub fn from_rate(wx: f32, wy: f32, wz: f32, dt: f32) -> Self {
        let half = 0.5 * dt;
        Self::new(1.0, wx * half, wy * half, wz * half).normalized()
    }

    /// Yaw en radianes (giro alrededor del eje vertical)
    pub fn yaw(self) -> f32 {
        let siny = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny.atan2(cosy)
    }

    /// Pitch en radianes (inclinación adelante/atrás)
    pub fn pitch(self) -> f32 {
        let sinp = 2.0 * (self.w * self.y - self.z * self.x);
        sinp.clamp(-1.0, 1.0).asin()
    }
}

/// Integra la velocidad angular corregida por deriva en una orientación
/// dispositivo→referencia, con corrección complementaria hacia la dirección
/// de gravedad estimada. La composición incremental de cuaterniones no sufre
/// bloqueo de cardán y se renormaliza en cada paso.
pub struct OrientationIntegrator {
    q: Quaternion,
    /// Ganancia de la corrección complementaria por gravedad (1/s)
    correction_gain: f32,
}

impl OrientationIntegrator {
    pub fn new(correction_gain: f32) -> Self {
        Self {
            q: Quaternion::identity(),
            correction_gain,
        }
    }

    pub fn quaternion(&self) -> Quaternion {
        self.q
    }

    pub fn reset(&mut self) {
        self.q = Quaternion::identity();
    }

    /// Aplica una muestra de giroscopio ya corregida por deriva. `up_hint` es
    /// la dirección unitaria de gravedad aparente en el marco del dispositivo
    /// (salida del estimador de gravedad); con `None` solo se integra.
    pub fn integrate(&mut self, rate: &ImuSample, dt: f32, up_hint: Option<[f32; 3]>) {
        let dq = Quaternion::from_rate(rate.x, rate.y, rate.z, dt);
        self.q = self.q.mul(dq).normalized();

        if let Some(measured) = up_hint {
            // Dirección vertical esperada, llevada al marco del dispositivo
            let predicted = self.q.conjugate().rotate([0.0, 0.0, 1.0]);
            let error = [
                measured[1] * predicted[2] - measured[2] * predicted[1],
                measured[2] * predicted[0] - measured[0] * predicted[2],
                measured[0] * predicted[1] - measured[1] * predicted[0],
            ];
            let gain = self.correction_gain * dt;
            let corr = Quaternion::from_rate(error[0], error[1], error[2], gain);
            self.q = self.q.mul(corr).normalized();
        }
    }
}
