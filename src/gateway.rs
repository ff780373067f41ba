//! Prediction gateway.
//!
//! Turns the raw strings of a request into a feature vector, runs it through
//! the gender and relationship classifiers and maps the predicted class
//! indices back to their labels.

use std::path::Path;
use tracing::debug;

use crate::error::{ClassifierError, ModelError, PredictError};
use crate::model::{Classifier, ModelLoader};
use crate::result::Classification;
use crate::schema::{ClassifierSchemas, FeatureVector, LabelTarget, MISSING};

/// Literal a caller sends for an unknown value.
pub const PLACEHOLDER: &str = "?";

/// Something that can answer a classification request.
pub trait Predictor: Send + Sync {
    fn classify(&self, raw: &[String], id: Option<String>) -> Result<Classification, PredictError>;

    /// Number of values a request must carry, if the predictor reads them.
    fn feature_count(&self) -> Option<usize>;
}

/// Parses caller-supplied values into a feature vector.
///
/// An empty string or `"?"` stands for an unknown value. NaN is treated the
/// same way; infinities are rejected along with anything that is not a number.
pub fn parse_features(raw: &[String]) -> Result<FeatureVector, PredictError> {
    raw.iter()
        .enumerate()
        .map(|(position, value)| parse_value(position, value))
        .collect::<Result<Vec<_>, _>>()
        .map(FeatureVector::new)
}

fn parse_value(position: usize, value: &str) -> Result<f64, PredictError> {
    if value.is_empty() || value == PLACEHOLDER {
        return Ok(MISSING);
    }
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_nan() => Ok(MISSING),
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PredictError::InvalidNumber {
            position,
            value: value.to_string(),
        }),
    }
}

/// Classifies requests with a loaded gender/relationship model pair.
pub struct Gateway {
    schemas: ClassifierSchemas,
    gender: Box<dyn Classifier>,
    relationship: Box<dyn Classifier>,
}

impl Gateway {
    pub fn new(
        schemas: ClassifierSchemas,
        gender: Box<dyn Classifier>,
        relationship: Box<dyn Classifier>,
    ) -> Self {
        Self {
            schemas,
            gender,
            relationship,
        }
    }

    /// Loads both model artifacts. Either one failing fails the whole load.
    pub fn load(
        schemas: ClassifierSchemas,
        gender_path: &Path,
        relationship_path: &Path,
    ) -> Result<Self, ModelError> {
        let loader = ModelLoader::new(&schemas);
        let gender = loader.load(LabelTarget::Gender, gender_path)?;
        let relationship = loader.load(LabelTarget::Relationship, relationship_path)?;
        Ok(Self::new(schemas, Box::new(gender), Box::new(relationship)))
    }

    pub fn schemas(&self) -> &ClassifierSchemas {
        &self.schemas
    }

    fn predict(&self, target: LabelTarget, vector: &FeatureVector) -> Result<String, PredictError> {
        let schema = self.schemas.get(target);
        let classifier = match target {
            LabelTarget::Gender => &self.gender,
            LabelTarget::Relationship => &self.relationship,
        };
        let fail = |source: ClassifierError| PredictError::Classifier {
            label: target.name(),
            source,
        };

        let instance = schema.bind(vector);
        match classifier.classify(&instance).map_err(fail)? {
            None => Ok(String::new()),
            Some(class) => schema.label_value(class).map(str::to_string).ok_or_else(|| {
                fail(ClassifierError::Prediction(format!(
                    "class {class} is outside the {} label table",
                    schema.label_values().len()
                )))
            }),
        }
    }
}

impl Predictor for Gateway {
    fn classify(&self, raw: &[String], id: Option<String>) -> Result<Classification, PredictError> {
        let expected = self.schemas.feature_count();
        if raw.len() != expected {
            return Err(PredictError::Arity {
                expected,
                actual: raw.len(),
            });
        }

        let vector = parse_features(raw)?;
        let gender = self.predict(LabelTarget::Gender, &vector)?;
        let relationship = self.predict(LabelTarget::Relationship, &vector)?;

        debug!(%gender, %relationship, "Request classified");
        Ok(Classification::new(id, gender, relationship))
    }

    fn feature_count(&self) -> Option<usize> {
        Some(self.schemas.feature_count())
    }
}

/// Answers every request with [`Classification::default_result`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StubPredictor;

impl Predictor for StubPredictor {
    fn classify(
        &self,
        _raw: &[String],
        id: Option<String>,
    ) -> Result<Classification, PredictError> {
        Ok(Classification::default_result(id))
    }

    fn feature_count(&self) -> Option<usize> {
        None
    }
}
