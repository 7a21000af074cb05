//! Colaborador clasificador: consume el vector de características derivado
//! del raster y devuelve etiquetas con puntaje. El motor real es externo;
//! `CentroidClassifier` ocupa el mismo seam con un modelo JSON de
//! centroides por clase.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid feature size: expected {expected}, got {actual}")]
    InvalidFeatureSize { expected: usize, actual: usize },

    #[error("Modelo sin clases utilizables")]
    EmptyModel,

    #[error("Centroid {index} has {actual} values, expected {expected}")]
    BadCentroid {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Model has {centroids} centroids for {labels} classes")]
    ClassCountMismatch { centroids: usize, labels: usize },

    #[error("Inference failed with status {status}")]
    InferenceStatus { status: i32 },
}

/// Desglose de tiempos de una predicción
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyTiming {
    pub feature_ms: f32,
    pub classification_ms: f32,
}

/// Resultado de clasificar un gesto
#[derive(Debug, Clone)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
    /// Todas las clases, ordenadas por puntaje descendente
    pub scores: Vec<(String, f32)>,
    pub timing: ClassifyTiming,
    pub anomaly: Option<f32>,
}

/// Seam del clasificador externo
pub trait Classifier {
    fn classify(&mut self, features: &[f32]) -> Result<Prediction, ClassifierError>;
}

/// Reescala el raster al rango [0, 1] y lo aplana para el clasificador
pub fn image_to_features(raster: &[i8]) -> Vec<f32> {
    raster
        .iter()
        .map(|&v| (v as f32 + 128.0) / 255.0)
        .collect()
}

#[derive(Debug, Deserialize)]
struct ClassesJson {
    index_to_class: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ModelJson {
    feature_len: usize,
    centroids: Vec<Vec<f32>>,
}

/// Clasificador de centroide más cercano cargado desde JSON. Mantiene la
/// misma interfaz de carga que un motor real: un archivo de modelo y un
/// archivo de clases indexadas.
pub struct CentroidClassifier {
    labels: Vec<String>,
    centroids: Vec<Vec<f32>>,
    feature_len: usize,
}

impl CentroidClassifier {
    pub fn new(model_path: &str, classes_path: &str) -> Result<Self, ClassifierError> {
        let labels = Self::load_classes(classes_path)?;

        let content = fs::read_to_string(model_path)?;
        let model: ModelJson = serde_json::from_str(&content)?;

        if labels.is_empty() || model.centroids.is_empty() {
            return Err(ClassifierError::EmptyModel);
        }
        if labels.len() != model.centroids.len() {
            return Err(ClassifierError::ClassCountMismatch {
                centroids: model.centroids.len(),
                labels: labels.len(),
            });
        }
        for (index, centroid) in model.centroids.iter().enumerate() {
            if centroid.len() != model.feature_len {
                return Err(ClassifierError::BadCentroid {
                    index,
                    expected: model.feature_len,
                    actual: centroid.len(),
                });
            }
        }

        println!("[MODELO] Cargado: {}", model_path);
        println!("[MODELO] Clases: {:?}", labels);

        Ok(Self {
            labels,
            centroids: model.centroids,
            feature_len: model.feature_len,
        })
    }

    fn load_classes(path: &str) -> Result<Vec<String>, ClassifierError> {
        let content = fs::read_to_string(path)?;
        let data: ClassesJson = serde_json::from_str(&content)?;

        // Convertir HashMap a Vec ordenado por índice
        let mut pairs: Vec<(usize, String)> = data
            .index_to_class
            .into_iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().map(|idx| (idx, v)))
            .collect();

        pairs.sort_by_key(|(idx, _)| *idx);
        Ok(pairs.into_iter().map(|(_, name)| name).collect())
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Classifier for CentroidClassifier {
    fn classify(&mut self, features: &[f32]) -> Result<Prediction, ClassifierError> {
        if features.len() != self.feature_len {
            return Err(ClassifierError::InvalidFeatureSize {
                expected: self.feature_len,
                actual: features.len(),
            });
        }

        let started = Instant::now();

        let mut distances = Vec::with_capacity(self.centroids.len());
        for centroid in &self.centroids {
            let d: f32 = centroid
                .iter()
                .zip(features)
                .map(|(c, f)| (c - f) * (c - f))
                .sum::<f32>()
                .sqrt();
            distances.push(d);
        }

        // Puntaje inverso a la distancia, normalizado a suma 1
        let raw: Vec<f32> = distances.iter().map(|d| 1.0 / (1.0 + d)).collect();
        let total: f32 = raw.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(ClassifierError::InferenceStatus { status: 1 });
        }

        let mut scores: Vec<(String, f32)> = self
            .labels
            .iter()
            .zip(&raw)
            .map(|(label, s)| (label.clone(), s / total))
            .collect();
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let best_distance = distances.iter().cloned().fold(f32::MAX, f32::min);
        let (label, score) = scores.first().cloned().ok_or(ClassifierError::EmptyModel)?;

        Ok(Prediction {
            label,
            score,
            scores,
            timing: ClassifyTiming {
                feature_ms: 0.0,
                classification_ms: started.elapsed().as_secs_f32() * 1000.0,
            },
            anomaly: Some(best_distance),
        })
    }
}
