use serde::{Deserialize, Serialize};

/// Labels predicted for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Caller-supplied identifier, echoed back unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub gender: String,
    pub relationship: String,
}

static DEFAULT_GENDER: &str = "female";
static DEFAULT_RELATIONSHIP: &str = "single";

impl Classification {
    pub fn new(
        id: Option<String>,
        gender: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Self {
        Self {
            id,
            gender: gender.into(),
            relationship: relationship.into(),
        }
    }

    /// Fixed answer served when no models are loaded.
    pub fn default_result(id: Option<String>) -> Self {
        Self::new(id, DEFAULT_GENDER, DEFAULT_RELATIONSHIP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_omitted_when_absent() {
        let json = serde_json::to_value(Classification::new(None, "male", "")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "gender": "male", "relationship": "" })
        );
    }

    #[test]
    fn default_result_carries_the_id() {
        let result = Classification::default_result(Some("42".into()));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "id": "42", "gender": "female", "relationship": "single" })
        );
    }
}
