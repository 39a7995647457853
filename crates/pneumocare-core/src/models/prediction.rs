use serde::{Deserialize, Serialize};

/// Result of an image classification from `/api/predict/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: String,
    pub confidence: f64,
}

impl Prediction {
    /// Confidence as a percentage with two decimals, e.g. "87.25%"
    pub fn display_confidence(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }
}

/// Answer from the retrieval-augmented chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    #[serde(default)]
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_confidence() {
        let p = Prediction {
            prediction: "Pneumonia".to_string(),
            confidence: 0.872_5,
        };
        assert_eq!(p.display_confidence(), "87.25%");
    }

    #[test]
    fn test_rag_answer_missing_field_defaults() {
        let answer: RagAnswer = serde_json::from_str("{}").unwrap();
        assert_eq!(answer.answer, "");
    }
}
