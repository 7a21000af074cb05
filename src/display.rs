//! Colaborador de pantalla: recibe texto de etiqueta, puntaje y estado.
//! El protocolo de píxeles del panel real queda fuera; acá solo vive el
//! seam y una implementación de consola.

use crate::types::RASTER_BACKGROUND;

pub trait GestureDisplay {
    fn show(&mut self, label: &str, score: &str, status: &str);
}

/// Pantalla de consola para operar el daemon sin hardware
pub struct ConsoleDisplay;

impl GestureDisplay for ConsoleDisplay {
    fn show(&mut self, label: &str, score: &str, status: &str) {
        println!("🖥️  {} {} [{}]", label, score, status);
    }
}

/// Volcado ASCII del raster: '#' para pixeles marcados, '.' para fondo,
/// una línea por fila.
pub fn render_ascii(raster: &[i8], width: usize, height: usize, channels: usize) -> String {
    let mut out = String::with_capacity(height * (width + 1));
    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) * channels;
            let marked = raster[idx..idx + channels]
                .iter()
                .any(|&v| v > RASTER_BACKGROUND);
            out.push(if marked { '#' } else { '.' });
        }
        out.push('\n');
    }
    out
}
