//! Classifier artifacts and the loader that pairs them with a schema.
//!
//! A model file is a MessagePack-encoded [`NaiveBayesModel`]: a fitted
//! Gaussian naive Bayes classifier from [`linfa-bayes`](https://crates.io/crates/linfa-bayes),
//! the per-feature means used to fill in missing values, and the signature of
//! the schema it was fitted against.
//!
//! Scoring does not go through `Predict`. The per-class Gaussian parameters
//! are read out of the fitted model once, ordered by class index, and ties in
//! the joint log-likelihood go to the lowest index.

use linfa_bayes::GaussianNb;
use ndarray::Array1;
use rmp_serde::{decode::from_read, encode::write_named};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::error::{ClassifierError, ModelError};
use crate::schema::{
    AttributeSchema, ClassifierSchemas, Instance, LabelTarget, SchemaSignature, is_missing,
};

/// A predictive model bound to one attribute schema.
pub trait Classifier: Send + Sync {
    /// Predicts a class index for `instance`, or `None` if the model has
    /// nothing to base a prediction on.
    fn classify(&self, instance: &Instance<'_>) -> Result<Option<usize>, ClassifierError>;
}

/// Fitted Gaussian naive Bayes model with its schema signature.
#[derive(Debug, Serialize, Deserialize)]
pub struct NaiveBayesModel {
    signature: SchemaSignature,
    feature_means: Vec<f64>,
    model: GaussianNb<f64, usize>,
    /// Class densities ordered by class index, rebuilt on load.
    #[serde(skip)]
    classes: Vec<(usize, ClassDensity)>,
}

/// Gaussian parameters of one class, as stored by `GaussianNb`.
#[derive(Debug, Clone, Deserialize)]
struct ClassDensity {
    prior: f64,
    theta: Array1<f64>,
    sigma: Array1<f64>,
}

#[derive(Deserialize)]
struct FittedClasses {
    class_info: BTreeMap<usize, ClassDensity>,
}

impl ClassDensity {
    /// Unnormalised log posterior of `row` under this class.
    fn joint_log_likelihood(&self, row: &[f64]) -> f64 {
        let mut jll = self.prior.ln();
        for ((x, theta), sigma) in row.iter().zip(&self.theta).zip(&self.sigma) {
            jll -= 0.5 * (2.0 * PI * sigma).ln();
            jll -= 0.5 * (x - theta).powi(2) / sigma;
        }
        jll
    }
}

impl NaiveBayesModel {
    /// Wraps an already fitted model for `schema`.
    ///
    /// `feature_means` holds one training mean per feature slot and is used in
    /// place of values a caller leaves out.
    pub fn new(
        schema: &AttributeSchema,
        feature_means: Vec<f64>,
        model: GaussianNb<f64, usize>,
    ) -> Result<Self, ModelError> {
        let mut this = Self {
            signature: schema.signature(),
            feature_means,
            model,
            classes: Vec::new(),
        };
        this.prepare()?;
        Ok(this)
    }

    /// Checks the artifact is usable at its signature width and extracts the
    /// class densities used for scoring.
    fn prepare(&mut self) -> Result<(), ModelError> {
        let width = self.signature.features.len();
        if self.feature_means.len() != width {
            return Err(ModelError::Invalid(format!(
                "{} feature means for {} features",
                self.feature_means.len(),
                width
            )));
        }
        if let Some(i) = self.feature_means.iter().position(|m| !m.is_finite()) {
            return Err(ModelError::Invalid(format!(
                "mean of feature '{}' is not finite",
                self.signature.features[i]
            )));
        }

        // GaussianNb keeps its parameters private; read them back through serde.
        let bytes = rmp_serde::to_vec_named(&self.model)?;
        let fitted: FittedClasses = rmp_serde::from_slice(&bytes)
            .map_err(|e| ModelError::Invalid(format!("unreadable class parameters: {e}")))?;
        if fitted.class_info.is_empty() {
            return Err(ModelError::Invalid("model has no classes".to_string()));
        }

        let labels = self.signature.label_values.len();
        for (&class, density) in &fitted.class_info {
            if class >= labels {
                return Err(ModelError::Invalid(format!(
                    "class {class} is outside the {labels} values of '{}'",
                    self.signature.label
                )));
            }
            if density.theta.len() != width || density.sigma.len() != width {
                return Err(ModelError::Invalid(format!(
                    "class {class} was fitted on {} features, expected {width}",
                    density.theta.len()
                )));
            }
            let usable = density.prior.is_finite()
                && density.prior > 0.0
                && density.theta.iter().all(|v| v.is_finite())
                && density.sigma.iter().all(|v| v.is_finite() && *v > 0.0);
            if !usable {
                return Err(ModelError::Invalid(format!(
                    "class {class} has non-finite or degenerate parameters"
                )));
            }
        }

        self.classes = fitted.class_info.into_iter().collect();
        Ok(())
    }

    pub fn signature(&self) -> &SchemaSignature {
        &self.signature
    }

    pub fn feature_count(&self) -> usize {
        self.feature_means.len()
    }

    /// Saves the model to a binary `.msgpack` file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ModelError> {
        let file = File::create(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        write_named(&mut writer, self)?;
        writer.flush().map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the model from a binary `.msgpack` file.
    pub fn load_from_file(path: &Path) -> Result<Self, ModelError> {
        let file = File::open(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut model: Self =
            from_read(BufReader::new(file)).map_err(|source| ModelError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        model.prepare()?;
        Ok(model)
    }
}

impl Classifier for NaiveBayesModel {
    fn classify(&self, instance: &Instance<'_>) -> Result<Option<usize>, ClassifierError> {
        let features: Vec<f64> = instance.features().collect();
        if features.len() != self.feature_means.len() {
            return Err(ClassifierError::Shape {
                expected: self.feature_means.len(),
                actual: features.len(),
            });
        }
        if features.iter().all(|v| is_missing(*v)) {
            return Ok(None);
        }

        let row: Vec<f64> = features
            .into_iter()
            .zip(&self.feature_means)
            .map(|(v, mean)| if is_missing(v) { *mean } else { v })
            .collect();
        if row.iter().any(|v| !v.is_finite()) {
            return Err(ClassifierError::Prediction(
                "feature values must be finite".to_string(),
            ));
        }

        let mut best: Option<(usize, f64)> = None;
        for (class, density) in &self.classes {
            let jll = density.joint_log_likelihood(&row);
            if !jll.is_finite() {
                continue;
            }
            if best.is_none_or(|(_, top)| jll > top) {
                best = Some((*class, jll));
            }
        }
        // None when no class has a finite likelihood for the row.
        Ok(best.map(|(class, _)| class))
    }
}

/// Loads model artifacts and checks them against the derived schemas.
pub struct ModelLoader<'a> {
    schemas: &'a ClassifierSchemas,
}

impl<'a> ModelLoader<'a> {
    pub fn new(schemas: &'a ClassifierSchemas) -> Self {
        Self { schemas }
    }

    /// Load the model for `target` from `path`.
    ///
    /// Fails if the file cannot be read or decoded, or if the artifact was
    /// fitted against a different attribute layout.
    pub fn load(&self, target: LabelTarget, path: &Path) -> Result<NaiveBayesModel, ModelError> {
        info!(label = %target, path = %path.display(), "Loading classifier model");

        let model = NaiveBayesModel::load_from_file(path)?;
        let expected = self.schemas.get(target).signature();
        if let Some(detail) = model.signature().mismatch(&expected) {
            return Err(ModelError::SchemaMismatch {
                path: path.to_path_buf(),
                target: target.name(),
                detail,
            });
        }

        info!(
            label = %target,
            features = model.feature_count(),
            classes = expected.label_values.len(),
            "Model loaded successfully"
        );
        Ok(model)
    }
}
