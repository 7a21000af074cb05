/// Una muestra IMU: marca de tiempo en segundos y lectura de tres ejes
/// en el marco del dispositivo. Giroscopio en rad/s, acelerómetro en m/s².
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuSample {
    pub t: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl ImuSample {
    pub fn new(t: f32, x: f32, y: f32, z: f32) -> Self {
        Self { t, x, y, z }
    }

    /// Magnitud euclidiana de la lectura
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Un punto del trazo: yaw/pitch en radianes relativos a la orientación
/// capturada al inicio del gesto.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StrokePoint {
    pub x: f32,
    pub y: f32,
}

/// Constantes del sistema
pub const SAMPLING_RATE: f32 = 100.0; // Hz nominales del IMU
pub const SAMPLE_INTERVAL: f32 = 1.0 / SAMPLING_RATE;

/// Capacidad del buffer de trazo (puntos por gesto)
pub const STROKE_CAPACITY: usize = 160;
/// Zancada de actualización de transmit_len durante la captura
pub const TRANSMIT_STRIDE: usize = 2;

/// Dimensiones del raster de salida
pub const RASTER_WIDTH: usize = 32;
pub const RASTER_HEIGHT: usize = 32;
pub const RASTER_CHANNELS: usize = 3;
pub const RASTER_BYTE_COUNT: usize = RASTER_WIDTH * RASTER_HEIGHT * RASTER_CHANNELS;
/// Margen por eje al mapear la caja envolvente a la grilla
pub const RASTER_SCALE: f32 = 0.6;

/// Valor de fondo y de marca del raster
pub const RASTER_BACKGROUND: i8 = -128;
pub const RASTER_FOREGROUND: i8 = 127;

/// Marcadores del protocolo de enlace
pub const LINK_START_MARKER: [u8; 2] = [0xF5, 0xF4];
pub const LINK_END_MARKER: [u8; 2] = [0x0D, 0x0A];
/// Capacidad del buffer de comando entrante; tramas que la alcanzan se descartan
pub const COMMAND_CAPACITY: usize = 32;
/// Un registro de cable cada tantos ciclos de giroscopio con enlace activo
pub const STREAM_PERIOD_CYCLES: u32 = 16;

/// Comandos reconocidos del dispositivo emparejado
pub const CMD_LINK_UP: &str = "IND=BLECONNECTED";
pub const CMD_LINK_DOWN: &str = "IND=BLEDISCONNECTED";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_magnitude() {
        let s = ImuSample::new(0.0, 3.0, 4.0, 0.0);
        assert!((s.magnitude() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_raster_byte_count() {
        assert_eq!(RASTER_BYTE_COUNT, 3072);
    }
}
