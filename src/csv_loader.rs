use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use csv::ReaderBuilder;

use crate::imu::ImuFrame;
use crate::types::{ImuSample, SAMPLING_RATE};

/// Carga una grabación cruda desde un CSV en el formato
/// sample,gx,gy,gz,ax,ay,az ordenado por sample. Giroscopio en rad/s,
/// acelerómetro en m/s².
pub fn load_frames_from_csv(path: impl AsRef<Path>) -> Result<Vec<ImuFrame>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut samples: BTreeMap<usize, ImuFrame> = BTreeMap::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
        if record.len() < 7 {
            bail!("La fila {} no tiene 7 columnas", row_idx + 1);
        }

        let sample: usize = record[0]
            .parse()
            .with_context(|| format!("sample inválido en fila {}", row_idx + 1))?;
        let t = sample as f32 / SAMPLING_RATE;

        let gx: f32 = record[1].parse()?;
        let gy: f32 = record[2].parse()?;
        let gz: f32 = record[3].parse()?;
        let ax: f32 = record[4].parse()?;
        let ay: f32 = record[5].parse()?;
        let az: f32 = record[6].parse()?;

        samples.insert(
            sample,
            ImuFrame {
                gyro: ImuSample::new(t, gx, gy, gz),
                accel: ImuSample::new(t, ax, ay, az),
            },
        );
    }

    if samples.is_empty() {
        return Err(anyhow!("El CSV {:?} no contiene datos", path));
    }

    let (&min_sample, _) = samples.iter().next().unwrap();
    ensure!(
        min_sample == 0,
        "El CSV debe iniciar en sample=0 (encontrado sample={})",
        min_sample
    );
    let max_sample = *samples.keys().max().unwrap();

    let mut frames = Vec::with_capacity(max_sample + 1);
    let mut last_frame = ImuFrame::default();
    for sample_idx in 0..=max_sample {
        if let Some(frame) = samples.get(&sample_idx) {
            last_frame = *frame;
            frames.push(*frame);
        } else {
            // Rellenar huecos repitiendo la última muestra válida
            frames.push(last_frame);
        }
    }

    Ok(frames)
}
