use super::{
    build_prompt, parse_response, ChatCompletionsClient, Classification, ClassificationMap,
    MergeReport, SchemaVariant,
};
use crate::config::ClassifierConfig;
use crate::error::{Result, TriageError};
use crate::normalization::CanonicalRecord;

/// Runs one batch through the model: prompt, call, strict validation.
#[derive(Debug, Clone)]
pub struct ClassificationOrchestrator {
    provider: ChatCompletionsClient,
    variant: SchemaVariant,
}

impl ClassificationOrchestrator {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        Ok(Self {
            provider: ChatCompletionsClient::new(config)?,
            variant: config.schema,
        })
    }

    pub fn variant(&self) -> SchemaVariant {
        self.variant
    }

    /// Classify a batch. Input problems are reported before any network call.
    pub async fn classify(
        &self,
        records: &[CanonicalRecord],
        credential: &str,
    ) -> Result<Vec<Classification>> {
        if credential.trim().is_empty() {
            return Err(TriageError::Unauthorized(
                "API key for the language model is required".to_string(),
            ));
        }
        if records.is_empty() {
            return Err(TriageError::Validation(
                "Emails array is required and must not be empty".to_string(),
            ));
        }

        let prompt = build_prompt(records, self.variant);
        log::info!("Classifying {} emails ({:?} schema)", records.len(), self.variant);
        let content = self.provider.complete(credential, &prompt).await?;
        let classifications = parse_response(&content, self.variant)?;
        log::debug!("Model returned {} classifications", classifications.len());
        Ok(classifications)
    }

    /// Classify and merge into `map`. The map is untouched on any failure.
    pub async fn classify_into(
        &self,
        records: &[CanonicalRecord],
        credential: &str,
        map: &mut ClassificationMap,
    ) -> Result<MergeReport> {
        let results = self.classify(records, credential).await?;
        Ok(map.merge(records.iter().map(|r| r.id.as_str()), results))
    }
}
