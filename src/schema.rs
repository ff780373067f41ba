//! Attribute schemas.
//!
//! The feature layout is described by an ARFF header bundled with the crate.
//! Two schemas are derived from it at startup: one predicting `gender` (with
//! the `relationship` column removed) and one predicting `relationship`
//! (with `gender` removed). Both share the same non-label feature slots.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::SchemaError;

/// Marker for a value that was not provided.
pub const MISSING: f64 = f64::NAN;

/// Name of the gender label attribute.
pub const GENDER: &str = "gender";
/// Name of the relationship label attribute.
pub const RELATIONSHIP: &str = "relationship";

static BUNDLED_SCHEMA: &str = include_str!("../resources/attrs.arff");

/// Returns `true` if `value` is the unknown-value marker.
pub fn is_missing(value: f64) -> bool {
    value.is_nan()
}

/// Value domain of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    Numeric,
    Nominal(Vec<String>),
}

/// A named slot in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
}

/// Which of the two classifiers a schema or model belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelTarget {
    Gender,
    Relationship,
}

impl LabelTarget {
    pub fn name(self) -> &'static str {
        match self {
            LabelTarget::Gender => GENDER,
            LabelTarget::Relationship => RELATIONSHIP,
        }
    }
}

impl fmt::Display for LabelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The schema as declared in the source, before a label is chosen.
#[derive(Debug, Clone)]
pub struct BaseSchema {
    relation: String,
    attributes: Vec<Attribute>,
}

impl BaseSchema {
    /// Parses the schema bundled with the crate.
    pub fn bundled() -> Result<Self, SchemaError> {
        Self::parse(BUNDLED_SCHEMA)
    }

    /// Parses an ARFF header. Everything after `@data` is ignored.
    pub fn parse(source: &str) -> Result<Self, SchemaError> {
        let mut relation = None;
        let mut attributes = Vec::new();
        let mut seen = HashSet::new();

        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('%') {
                continue;
            }

            let (keyword, rest) = match text.find(char::is_whitespace) {
                Some(pos) => (&text[..pos], &text[pos..]),
                None => (text, ""),
            };

            match keyword.to_ascii_lowercase().as_str() {
                "@relation" => {
                    let (name, _) = take_name(rest, line)?;
                    relation = Some(name);
                }
                "@attribute" => {
                    let (name, rest) = take_name(rest, line)?;
                    let kind = parse_kind(rest, line)?;
                    if !seen.insert(name.clone()) {
                        return Err(SchemaError::DuplicateAttribute(name));
                    }
                    attributes.push(Attribute { name, kind });
                }
                "@data" => break,
                other => {
                    return Err(SchemaError::Malformed {
                        line,
                        reason: format!("unexpected declaration '{other}'"),
                    });
                }
            }
        }

        let relation = relation.ok_or(SchemaError::MissingRelation)?;
        Ok(Self {
            relation,
            attributes,
        })
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    fn position(&self, name: &str) -> Result<usize, SchemaError> {
        self.attributes
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| SchemaError::MissingAttribute(name.to_string()))
    }

    /// Derives a schema labelled by `label` with the `drop` attribute removed.
    pub fn derive(&self, label: &str, drop: &str) -> Result<AttributeSchema, SchemaError> {
        self.position(label)?;
        let drop_at = self.position(drop)?;

        let mut attributes = self.attributes.clone();
        attributes.remove(drop_at);

        let label_index = attributes
            .iter()
            .position(|a| a.name == label)
            .ok_or_else(|| SchemaError::MissingAttribute(label.to_string()))?;
        if !matches!(attributes[label_index].kind, AttributeKind::Nominal(_)) {
            return Err(SchemaError::LabelNotNominal(label.to_string()));
        }

        Ok(AttributeSchema {
            relation: self.relation.clone(),
            attributes,
            label_index,
        })
    }
}

/// Splits an attribute or relation name off the front of `rest`.
fn take_name(rest: &str, line: usize) -> Result<(String, &str), SchemaError> {
    let rest = rest.trim_start();
    let mut chars = rest.chars();
    match chars.next() {
        None => Err(SchemaError::Malformed {
            line,
            reason: "missing name".to_string(),
        }),
        Some(q @ ('\'' | '"')) => {
            let body = &rest[1..];
            let end = body.find(q).ok_or_else(|| SchemaError::Malformed {
                line,
                reason: "unterminated quoted name".to_string(),
            })?;
            Ok((body[..end].to_string(), &body[end + 1..]))
        }
        Some(_) => {
            let end = rest
                .find(|c: char| c.is_whitespace() || c == '{')
                .unwrap_or(rest.len());
            Ok((rest[..end].to_string(), &rest[end..]))
        }
    }
}

fn parse_kind(rest: &str, line: usize) -> Result<AttributeKind, SchemaError> {
    let ty = rest.trim();
    if let Some(list) = ty.strip_prefix('{') {
        let list = list.strip_suffix('}').ok_or_else(|| SchemaError::Malformed {
            line,
            reason: "unterminated nominal list".to_string(),
        })?;
        let values = parse_nominal_values(list, line)?;
        if values.is_empty() {
            return Err(SchemaError::Malformed {
                line,
                reason: "empty nominal list".to_string(),
            });
        }
        return Ok(AttributeKind::Nominal(values));
    }

    match ty.to_ascii_lowercase().as_str() {
        "numeric" | "real" | "integer" => Ok(AttributeKind::Numeric),
        "" => Err(SchemaError::Malformed {
            line,
            reason: "missing attribute type".to_string(),
        }),
        other => Err(SchemaError::Malformed {
            line,
            reason: format!("unsupported attribute type '{other}'"),
        }),
    }
}

fn parse_nominal_values(list: &str, line: usize) -> Result<Vec<String>, SchemaError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote(b'\'')
        .trim(csv::Trim::All)
        .from_reader(list.as_bytes());

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SchemaError::Malformed {
            line,
            reason: e.to_string(),
        })?;
        values.extend(
            record
                .iter()
                .map(unquote)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        );
    }
    Ok(values)
}

// csv only honours quotes at the very start of a field, so `a, 'b c'`
// leaves the quotes on the trimmed second value.
fn unquote(value: &str) -> &str {
    for q in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(q)
            .and_then(|v| v.strip_suffix(q))
        {
            return inner;
        }
    }
    value
}

/// An ordered set of attributes with one designated label slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSchema {
    relation: String,
    attributes: Vec<Attribute>,
    label_index: usize,
}

impl AttributeSchema {
    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Total slot count, label included.
    pub fn width(&self) -> usize {
        self.attributes.len()
    }

    /// Number of non-label slots a caller has to supply.
    pub fn feature_count(&self) -> usize {
        self.attributes.len() - 1
    }

    pub fn label_index(&self) -> usize {
        self.label_index
    }

    pub fn label_name(&self) -> &str {
        &self.attributes[self.label_index].name
    }

    /// The label-value table, indexed by predicted class.
    pub fn label_values(&self) -> &[String] {
        match &self.attributes[self.label_index].kind {
            AttributeKind::Nominal(values) => values.as_slice(),
            AttributeKind::Numeric => &[],
        }
    }

    pub fn label_value(&self, class: usize) -> Option<&str> {
        self.label_values().get(class).map(String::as_str)
    }

    /// Names of the non-label slots, in order.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.attributes
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.label_index)
            .map(|(_, a)| a.name.as_str())
    }

    pub fn signature(&self) -> SchemaSignature {
        SchemaSignature {
            label: self.label_name().to_string(),
            label_values: self.label_values().to_vec(),
            features: self.feature_names().map(str::to_string).collect(),
        }
    }

    /// Binds a feature vector to this schema, moving the trailing label
    /// placeholder into the label slot.
    pub fn bind(&self, vector: &FeatureVector) -> Instance<'_> {
        let mut values = vector.features().to_vec();
        values.insert(self.label_index.min(values.len()), MISSING);
        Instance {
            schema: self,
            values,
        }
    }
}

/// Layout a model artifact was fitted against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSignature {
    pub label: String,
    pub label_values: Vec<String>,
    pub features: Vec<String>,
}

impl SchemaSignature {
    /// Describes the first difference from `expected`, if any.
    pub fn mismatch(&self, expected: &SchemaSignature) -> Option<String> {
        if self.label != expected.label {
            return Some(format!(
                "label is '{}', expected '{}'",
                self.label, expected.label
            ));
        }
        if self.label_values != expected.label_values {
            return Some(format!(
                "label values are {:?}, expected {:?}",
                self.label_values, expected.label_values
            ));
        }
        if self.features.len() != expected.features.len() {
            return Some(format!(
                "{} features, expected {}",
                self.features.len(),
                expected.features.len()
            ));
        }
        self.features
            .iter()
            .zip(&expected.features)
            .position(|(a, b)| a != b)
            .map(|i| {
                format!(
                    "feature {i} is '{}', expected '{}'",
                    self.features[i], expected.features[i]
                )
            })
    }
}

/// Per-request feature values followed by one placeholder for the label.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(mut features: Vec<f64>) -> Self {
        features.push(MISSING);
        Self { values: features }
    }

    /// All values, trailing label placeholder included.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Feature values without the label placeholder.
    pub fn features(&self) -> &[f64] {
        &self.values[..self.values.len() - 1]
    }
}

/// A feature vector laid out according to one schema.
#[derive(Debug, Clone)]
pub struct Instance<'a> {
    schema: &'a AttributeSchema,
    values: Vec<f64>,
}

impl<'a> Instance<'a> {
    pub fn schema(&self) -> &'a AttributeSchema {
        self.schema
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Non-label values in schema order.
    pub fn features(&self) -> impl Iterator<Item = f64> + '_ {
        let label = self.schema.label_index();
        self.values
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != label)
            .map(|(_, v)| *v)
    }
}

/// The gender and relationship schemas derived from one base schema.
#[derive(Debug, Clone)]
pub struct ClassifierSchemas {
    pub gender: AttributeSchema,
    pub relationship: AttributeSchema,
}

impl ClassifierSchemas {
    pub fn bundled() -> Result<Self, SchemaError> {
        Self::from_base(&BaseSchema::bundled()?)
    }

    pub fn from_base(base: &BaseSchema) -> Result<Self, SchemaError> {
        Ok(Self {
            gender: base.derive(GENDER, RELATIONSHIP)?,
            relationship: base.derive(RELATIONSHIP, GENDER)?,
        })
    }

    pub fn get(&self, target: LabelTarget) -> &AttributeSchema {
        match target {
            LabelTarget::Gender => &self.gender,
            LabelTarget::Relationship => &self.relationship,
        }
    }

    /// Number of values a request must carry.
    pub fn feature_count(&self) -> usize {
        self.gender.feature_count()
    }
}
