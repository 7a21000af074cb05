//! Rasterización del trazo: transforma la secuencia ordenada de puntos en
//! una imagen normalizada de tamaño fijo para el clasificador.

use crate::types::{StrokePoint, RASTER_BACKGROUND, RASTER_FOREGROUND};

/// Coordenada normalizada dentro de la caja envolvente. Un eje degenerado
/// (rango nulo) centra el punto en ese eje.
fn norm_coord(v: f32, min: f32, range: f32) -> f32 {
    if range > 0.0 {
        (v - min) / range
    } else {
        0.5
    }
}

/// Mapea una coordenada normalizada a la grilla dejando margen: escalas en
/// (0, 1] encogen el trazo hacia adentro desde los bordes.
fn to_grid(norm: f32, scale: f32, dim: usize) -> f32 {
    ((norm - 0.5) * scale + 0.5) * (dim - 1) as f32
}

fn mark(buffer: &mut [i8], x: i32, y: i32, width: usize, height: usize, channels: usize) {
    if x < 0 || x >= width as i32 || y < 0 || y >= height as i32 {
        return;
    }
    let idx = (y as usize * width + x as usize) * channels;
    for c in 0..channels {
        buffer[idx + c] = RASTER_FOREGROUND;
    }
}

/// Rasteriza el trazo a una imagen `width × height × channels` de i8:
/// -128 es fondo y todo valor mayor es marca. Función pura: entradas
/// idénticas producen siempre la misma imagen.
///
/// Las escalas por eje son independientes a propósito: gestos de
/// proporciones distintas se normalizan al mismo lienzo fijo.
pub fn rasterize(
    points: &[StrokePoint],
    scale_x: f32,
    scale_y: f32,
    width: usize,
    height: usize,
    channels: usize,
) -> Vec<i8> {
    let mut buffer = vec![RASTER_BACKGROUND; width * height * channels];

    if points.is_empty() {
        return buffer;
    }

    // Caja envolvente del camino
    let mut min_x = f32::MAX;
    let mut max_x = f32::MIN;
    let mut min_y = f32::MAX;
    let mut max_y = f32::MIN;
    for p in points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    let range_x = max_x - min_x;
    let range_y = max_y - min_y;

    let map = |p: &StrokePoint| -> (f32, f32) {
        (
            to_grid(norm_coord(p.x, min_x, range_x), scale_x, width),
            to_grid(norm_coord(p.y, min_y, range_y), scale_y, height),
        )
    };

    if points.len() == 1 {
        let (x, y) = map(&points[0]);
        mark(
            &mut buffer,
            x.round() as i32,
            y.round() as i32,
            width,
            height,
            channels,
        );
        return buffer;
    }

    for pair in points.windows(2) {
        let (x0, y0) = map(&pair[0]);
        let (x1, y1) = map(&pair[1]);
        let dx = x1 - x0;
        let dy = y1 - y0;

        // Caminar el eje dominante un pixel por paso, interpolando el menor
        let steps = dx.abs().max(dy.abs()).round() as i32;
        if steps == 0 {
            mark(
                &mut buffer,
                x0.round() as i32,
                y0.round() as i32,
                width,
                height,
                channels,
            );
            continue;
        }

        let x_inc = dx / steps as f32;
        let y_inc = dy / steps as f32;
        for i in 0..=steps {
            let x = x0 + x_inc * i as f32;
            let y = y0 + y_inc * i as f32;
            mark(
                &mut buffer,
                x.round() as i32,
                y.round() as i32,
                width,
                height,
                channels,
            );
        }
    }

    buffer
}
