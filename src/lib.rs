//! # multidata-classifier 🧠🚻💍
//!
//! Serve gender and relationship predictions over HTTP from two pre-trained
//! Gaussian Naive Bayes models.
//!
//! The feature layout comes from an ARFF header bundled with the crate. At
//! startup two schemas are derived from it (one per label), the two
//! [`rmp-serde`](https://crates.io/crates/rmp-serde) model artifacts are loaded
//! and checked against them, and an [`axum`](https://crates.io/crates/axum)
//! router answers `POST /classification` with both labels.
//!
//! ## Features
//! - ARFF header parsing and per-label schema derivation
//! - Gaussian Naive Bayes via [`linfa-bayes`](https://crates.io/crates/linfa-bayes)
//! - Missing values (`""` or `"?"`) imputed from training means
//! - Model artifacts carry the schema they were fitted on; mismatches fail startup
//! - Stub mode with fixed answers for testing client wiring
//! - Benchmarkable with [Criterion](https://crates.io/crates/criterion)
//!
//! ## Example
//! ```rust,no_run
//! use std::path::Path;
//! use multidata_classifier::{ClassifierSchemas, Gateway, Predictor};
//!
//! let schemas = ClassifierSchemas::bundled()?;
//! let gateway = Gateway::load(
//!     schemas,
//!     Path::new("models/gender.msgpack"),
//!     Path::new("models/relationship.msgpack"),
//! )?;
//! let values: Vec<String> = vec!["?".into(); gateway.schemas().feature_count()];
//! let result = gateway.classify(&values, None)?;
//! println!("gender: {}, relationship: {}", result.gender, result.relationship);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod result;
pub mod schema;
pub mod server;

pub use error::{ClassifierError, ConfigError, ModelError, PredictError, SchemaError};
pub use gateway::{Gateway, Predictor, StubPredictor};
pub use model::{Classifier, ModelLoader, NaiveBayesModel};
pub use result::Classification;
pub use schema::{AttributeSchema, BaseSchema, ClassifierSchemas, LabelTarget};
