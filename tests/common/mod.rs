#![allow(dead_code)]

use linfa::prelude::*;
use linfa_bayes::GaussianNb;
use ndarray::{Array1, Array2, Axis};
use std::path::{Path, PathBuf};

use multidata_classifier::{AttributeSchema, ClassifierSchemas, NaiveBayesModel};

/// Fits a model whose class 0 clusters around 0 and class 1 around 10.
pub fn fit(schema: &AttributeSchema) -> NaiveBayesModel {
    let n = schema.feature_count();
    let rows = 40;
    let mut values = Vec::with_capacity(rows * n);
    let mut classes = Vec::with_capacity(rows);
    for i in 0..rows {
        let class = i % 2;
        let base = if class == 0 { 0.0 } else { 10.0 };
        for j in 0..n {
            values.push(base + ((i * 5 + j * 3) % 7) as f64 * 0.2);
        }
        classes.push(class);
    }
    let x = Array2::from_shape_vec((rows, n), values).unwrap();
    let means = x.mean_axis(Axis(0)).unwrap().to_vec();
    let y = Array1::from_vec(classes);
    let model = GaussianNb::params().fit(&Dataset::new(x, y)).unwrap();
    NaiveBayesModel::new(schema, means, model).unwrap()
}

/// Writes gender and relationship artifacts for the bundled schema into `dir`.
pub fn write_models(dir: &Path) -> (PathBuf, PathBuf) {
    let schemas = ClassifierSchemas::bundled().unwrap();
    let gender = dir.join("gender.msgpack");
    let relationship = dir.join("relationship.msgpack");
    fit(&schemas.gender).save_to_file(&gender).unwrap();
    fit(&schemas.relationship).save_to_file(&relationship).unwrap();
    (gender, relationship)
}

pub fn feature_count() -> usize {
    ClassifierSchemas::bundled().unwrap().feature_count()
}
