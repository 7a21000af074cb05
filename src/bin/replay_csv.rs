use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::bounded;
use trazo::classifier::CentroidClassifier;
use trazo::csv_loader::load_frames_from_csv;
use trazo::display::GestureDisplay;
use trazo::imu::{ImuBatch, ImuProvider, RecordedImu};
use trazo::pipeline::{GestureSession, SessionParams};
use trazo::types::ImuSample;
use trazo::wire::StrokeWireRecord;

struct ReplayOptions {
    dump_points: bool,
    dump_wire: bool,
}

fn parse_args() -> Result<(PathBuf, ReplayOptions)> {
    let mut dump_points = false;
    let mut dump_wire = false;
    let mut csv_path: Option<PathBuf> = None;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--dump-points" => dump_points = true,
            "--dump-wire" => dump_wire = true,
            _ => {
                if csv_path.is_some() {
                    bail!("Uso: replay_csv [--dump-points] [--dump-wire] <grabacion.csv>");
                }
                csv_path = Some(PathBuf::from(arg));
            }
        }
    }

    let csv_path = csv_path.ok_or_else(|| anyhow!("Debes especificar una grabación CSV"))?;
    Ok((
        csv_path,
        ReplayOptions {
            dump_points,
            dump_wire,
        },
    ))
}

/// Pantalla muda: el replay reporta por su cuenta
struct NullDisplay;

impl GestureDisplay for NullDisplay {
    fn show(&mut self, _label: &str, _score: &str, _status: &str) {}
}

fn main() -> Result<()> {
    let (csv_path, opts) = parse_args()?;
    println!("🎞️  Reproduciendo gesto desde {:?}", csv_path);

    let frames = load_frames_from_csv(&csv_path)?;
    println!("✅ {} frames\n", frames.len());

    let classifier = CentroidClassifier::new("modelo_centroides.json", "clases.json")?;

    let (_cmd_tx, cmd_rx) = bounded(1);
    let (rec_tx, _rec_rx) = bounded(1);
    let mut session = GestureSession::new(
        SessionParams::default(),
        cmd_rx,
        rec_tx,
        Box::new(classifier),
        Box::new(NullDisplay),
    );

    let mut imu = RecordedImu::new(frames, false);
    let mut prediction = None;

    while !imu.exhausted() {
        let batch = imu.read();
        if batch.is_empty() {
            break;
        }
        let report = session.process_cycle(&batch);
        if report.prediction.is_some() {
            prediction = report.prediction;
        }
    }

    // Cola de quietud para cerrar un trazo que quedó en vuelo
    for _ in 0..64 {
        if prediction.is_some() {
            break;
        }
        let still = ImuBatch {
            gyro: vec![ImuSample::default()],
            accel: Vec::new(),
        };
        let report = session.process_cycle(&still);
        if report.prediction.is_some() {
            prediction = report.prediction;
        }
    }

    let prediction =
        prediction.ok_or_else(|| anyhow!("La grabación no contiene ningún gesto detectable"))?;

    println!(
        "\n🥇 Gesto: {} ({:.1}%)",
        prediction.label,
        prediction.score * 100.0
    );

    println!("\nTop-5 probabilidades:");
    for (idx, (label, score)) in prediction.scores.iter().take(5).enumerate() {
        println!("  {:>2}. {:<25} {:>6.2}%", idx + 1, label, score * 100.0);
    }

    if opts.dump_points {
        let buffer = session.tracker().buffer();
        println!("\n📊 {} puntos capturados:", buffer.len());
        for (idx, p) in buffer.points().iter().enumerate() {
            println!("  {:03}: {:>9.5} {:>9.5}", idx, p.x, p.y);
        }
    }

    if opts.dump_wire {
        let record = StrokeWireRecord::snapshot(
            session.tracker().state_code(),
            session.tracker().buffer().transmit_points(),
        );
        let encoded = record.encode();
        println!("\n🧱 Registro de cable ({} bytes):", encoded.len());
        for chunk in encoded.chunks(16) {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            println!("  {}", hex.join(" "));
        }
    }

    Ok(())
}
