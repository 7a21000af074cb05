//! Registro binario de cable para el streaming de trazos.
//!
//! Layout versión 1, little-endian, 328 bytes fijos:
//!
//! | offset | tamaño | campo |
//! |--------|--------|-------|
//! | 0      | 4      | estado del tracker, i32 (0 Idle, 1 Tracking, 2 Done) |
//! | 4      | 4      | cantidad de puntos transmitidos, i32 |
//! | 8      | 320    | 160 pares (x, y) i8 en centirradianes saturados |
//!
//! Los pares más allá de la cantidad transmitida van en cero. El receptor
//! conoce el layout; el framing es opaco para él.

use crate::types::{StrokePoint, STROKE_CAPACITY};

/// Tamaño total del registro en bytes
pub const RECORD_SIZE: usize = 8 + STROKE_CAPACITY * 2;

/// Versión del layout
pub const RECORD_VERSION: u8 = 1;

/// Centirradianes saturados al rango de i8
fn quantize(v: f32) -> i8 {
    (v * 100.0).round().clamp(-128.0, 127.0) as i8
}

/// Instantánea serializable del estado de seguimiento
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeWireRecord {
    pub state: i32,
    pub count: i32,
    pub points: Vec<(i8, i8)>,
}

impl StrokeWireRecord {
    /// Construye la instantánea del estado actual. Solo se serializan los
    /// puntos válidos para transmitir.
    pub fn snapshot(state: i32, points: &[StrokePoint]) -> Self {
        let count = points.len().min(STROKE_CAPACITY);
        Self {
            state,
            count: count as i32,
            points: points[..count]
                .iter()
                .map(|p| (quantize(p.x), quantize(p.y)))
                .collect(),
        }
    }

    /// Serializa al buffer de cable de 328 bytes
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.state.to_le_bytes());
        buf[4..8].copy_from_slice(&self.count.to_le_bytes());
        for (i, &(x, y)) in self.points.iter().enumerate().take(STROKE_CAPACITY) {
            let off = 8 + i * 2;
            buf[off] = x as u8;
            buf[off + 1] = y as u8;
        }
        buf
    }

    /// Reconstruye un registro desde el buffer de cable. Devuelve `None` si
    /// el tamaño no coincide o la cantidad de puntos es inconsistente.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != RECORD_SIZE {
            return None;
        }
        let state = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let count = i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        if !(0..=STROKE_CAPACITY as i32).contains(&count) {
            return None;
        }
        let points = (0..count as usize)
            .map(|i| {
                let off = 8 + i * 2;
                (buf[off] as i8, buf[off + 1] as i8)
            })
            .collect();
        Some(Self {
            state,
            count,
            points,
        })
    }
}
