/*
Daemon de captura y clasificación de gestos IMU

Reproduce una grabación cruda (o una al azar de un directorio) por la
sesión completa a ritmo nominal, mientras un hilo RX arma tramas de
comando desde stdin y un hilo escritor vuelca los registros de cable.

Uso:
    trazo <grabacion.csv | directorio> [registros.bin]

Comandos por stdin (framing 0xF5 0xF4 ... 0x0D 0x0A):
    IND=BLECONNECTED     activa el enlace (modo periférico de streaming)
    IND=BLEDISCONNECTED  desactiva el enlace (modo clasificador autónomo)
*/

use std::env;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{bounded, select};

use trazo::classifier::CentroidClassifier;
use trazo::csv_loader::load_frames_from_csv;
use trazo::display::ConsoleDisplay;
use trazo::imu::{ImuBatch, ImuProvider, RecordedImu};
use trazo::link::{CommandFrame, CommandFramer};
use trazo::pipeline::{GestureSession, SessionParams};
use trazo::types::SAMPLE_INTERVAL;
use trazo::wire::StrokeWireRecord;

const MODEL_PATH: &str = "modelo_centroides.json";
const CLASSES_PATH: &str = "clases.json";

/// Si el argumento es un directorio, elige un CSV al azar
fn pick_recording(input: &str) -> Result<PathBuf> {
    let path = PathBuf::from(input);
    if path.is_file() {
        return Ok(path);
    }
    if !path.is_dir() {
        bail!("No existe la ruta {:?}", path);
    }

    let csv_files: Vec<PathBuf> = fs::read_dir(&path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();

    if csv_files.is_empty() {
        bail!("No hay archivos CSV en {:?}", path);
    }

    use rand::Rng;
    let random_idx = rand::thread_rng().gen_range(0..csv_files.len());
    Ok(csv_files[random_idx].clone())
}

fn main() -> Result<()> {
    println!("🎯 Trazo - captura y clasificación de gestos IMU\n");

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("Uso: trazo <grabacion.csv | directorio> [registros.bin]");
    }

    let csv_path = pick_recording(&args[1])?;
    println!("📄 Grabación: {:?}", csv_path);
    let frames = load_frames_from_csv(&csv_path)?;
    println!("✅ {} frames cargados\n", frames.len());

    println!("🔧 Inicializando clasificador...");
    let classifier = CentroidClassifier::new(MODEL_PATH, CLASSES_PATH)?;
    println!("✅ Clasificador cargado\n");

    // Handoff SPSC del hilo RX a la sesión y canal acotado de salida
    let (cmd_tx, cmd_rx) = bounded::<CommandFrame>(8);
    let (rec_tx, rec_rx) = bounded::<StrokeWireRecord>(32);
    let (imu_tx, imu_rx) = bounded::<ImuBatch>(100);

    // Hilo RX: bytes de stdin → framer → canal de comandos
    std::thread::spawn(move || {
        let mut framer = CommandFramer::new();
        let stdin = std::io::stdin();
        let mut handle = stdin.lock();
        let mut buf = [0u8; 64];
        loop {
            match handle.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    for &byte in &buf[..n] {
                        if let Some(frame) = framer.push_byte(byte) {
                            let _ = cmd_tx.send(frame);
                        }
                    }
                }
            }
        }
    });

    // Hilo escritor: vuelca registros de cable al archivo de salida, si hay
    let mut out_file = match args.get(2) {
        Some(p) => Some(fs::File::create(p).with_context(|| format!("No se pudo crear {:?}", p))?),
        None => None,
    };
    std::thread::spawn(move || {
        while let Ok(record) = rec_rx.recv() {
            if let Some(f) = out_file.as_mut() {
                if f.write_all(&record.encode()).is_err() {
                    eprintln!("⚠️  Falló la escritura del registro; se descarta");
                }
            }
        }
    });

    // Hilo alimentador: reproduce la grabación en bucle a ritmo nominal
    std::thread::spawn(move || {
        let mut imu = RecordedImu::new(frames, true);
        loop {
            let batch = imu.read();
            if batch.is_empty() || imu_tx.send(batch).is_err() {
                break;
            }
            std::thread::sleep(Duration::from_secs_f32(SAMPLE_INTERVAL));
        }
    });

    let mut session = GestureSession::new(
        SessionParams::default(),
        cmd_rx,
        rec_tx,
        Box::new(classifier),
        Box::new(ConsoleDisplay),
    );

    println!("🎬 Iniciando reconocimiento...\n");

    let mut gestures = 0u32;
    loop {
        select! {
            recv(imu_rx) -> msg => {
                let batch = msg.map_err(|_| anyhow!("Fuente IMU agotada"))?;
                let report = session.process_cycle(&batch);

                if let Some(pred) = report.prediction {
                    gestures += 1;
                    println!(
                        "[GESTO {}] {} ({:.1}%)\n",
                        gestures,
                        pred.label,
                        pred.score * 100.0
                    );
                }
            }
        }
    }
}
