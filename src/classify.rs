//! Visual-vs-text query classification.
//!
//! Obvious cases are settled by keywords; the rest go to the text model,
//! whose answer is decoded with the structured-output parser. Every
//! failure path ends in [`Classification::default_text`], so callers always
//! get an answer.

use std::sync::Arc;

use advisory_harness_core::parse::extract_record;
use advisory_harness_core::visual::{classify_by_keywords, Classification};

use crate::error::{HarnessError, HarnessResult};
use crate::remote::{GenerateRequest, GenerativeModel};

const CLASSIFY_PROMPT: &str = r#"You are a query classifier for a farmer-focused agricultural assistant.
Classify whether this query would benefit MORE from a VISUAL response (infographic, diagram, chart)
or a TEXT response (plain explanation).

VISUAL queries include:
- How-to processes (planting steps, treatment procedures)
- Schedules and timelines (fertilizer schedule, irrigation calendar)
- Disease/pest symptoms and identification
- Comparisons (varieties, methods, products)
- Statistics and data

TEXT queries include:
- Greetings and pleasantries
- Simple factual questions
- Clarification requests
- Opinion or advice seeking
- Conversational questions

Query: "{question}"

Respond ONLY with JSON:
{"format": "visual" or "text", "confidence": 0.0-1.0, "reason": "brief explanation"}"#;

pub struct QueryClassifier {
    model: Option<Arc<dyn GenerativeModel>>,
    text_model: String,
}

impl QueryClassifier {
    pub fn new(model: Option<Arc<dyn GenerativeModel>>, text_model: impl Into<String>) -> Self {
        Self {
            model,
            text_model: text_model.into(),
        }
    }

    /// Classify `question`. Never fails.
    pub fn classify_query(&self, question: &str) -> Classification {
        if let Some(classification) = classify_by_keywords(question) {
            tracing::info!(format = ?classification.format, "query classified by keywords");
            return classification;
        }

        match self.classify_with_model(question) {
            Ok(classification) => {
                tracing::info!(
                    format = ?classification.format,
                    confidence = classification.confidence,
                    "query classified by model"
                );
                classification
            }
            Err(e) if e.is_not_configured() => {
                tracing::warn!(error = %e, "classification model unavailable");
                Classification::default_text("AI unavailable, defaulting to text")
            }
            Err(e) => {
                tracing::warn!(error = %e, "query classification failed");
                Classification::default_text("Classification failed, defaulting to text")
            }
        }
    }

    fn classify_with_model(&self, question: &str) -> HarnessResult<Classification> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| HarnessError::NotConfigured("no generative model".to_string()))?;

        let prompt = CLASSIFY_PROMPT.replace("{question}", question);
        let response = model
            .generate(&GenerateRequest::text(&self.text_model, prompt))
            .map_err(|e| HarnessError::TransientIo(format!("{:#}", e)))?;

        let raw = response.text.unwrap_or_default();
        let record = extract_record(&raw).ok_or_else(|| {
            tracing::debug!(raw = %raw, "classifier output has no record");
            HarnessError::MalformedOutput("no record in classifier output".to_string())
        })?;
        Classification::from_record(&record).ok_or_else(|| {
            HarnessError::MalformedOutput("classifier record has no usable format".to_string())
        })
    }
}
