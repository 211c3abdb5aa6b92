use std::time::{Duration, Instant};

use super::normalize::preview;
use super::prompt::extraction_instruction;
use super::types::ImageArtifact;
use super::{CatalogingError, Stage};
use crate::pipeline::inference::{InferenceClient, InferenceRequest};
use crate::pipeline::templates::InstructionPair;
use crate::pipeline_config::RetryPolicy;

/// Librarian stage: full metadata extraction with a resolved instruction pair.
///
/// The model id is chosen by the caller from the tier; this stage never
/// picks a model itself.
pub struct Extractor<'a> {
    client: &'a dyn InferenceClient,
    timeout: Duration,
    retry: RetryPolicy,
}

impl<'a> Extractor<'a> {
    pub fn new(client: &'a dyn InferenceClient, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client,
            timeout,
            retry,
        }
    }

    /// Run extraction and return the model's raw text.
    pub fn extract(
        &self,
        image: &ImageArtifact,
        instructions: &InstructionPair,
        model_id: &str,
    ) -> Result<String, CatalogingError> {
        let instruction = extraction_instruction(instructions);
        let request = InferenceRequest {
            model_id,
            image: &image.bytes,
            mime_type: &image.mime_type,
            instruction: &instruction,
            timeout: self.timeout,
        };

        let max_attempts = self.retry.max_attempts();
        let mut attempt = 1;
        loop {
            let start = Instant::now();
            match self.client.generate(&request) {
                Ok(raw) => {
                    tracing::debug!(
                        model = %model_id,
                        attempt,
                        elapsed_ms = %start.elapsed().as_millis(),
                        response = %preview(&raw),
                        "Extraction response received"
                    );
                    return Ok(raw);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    tracing::warn!(
                        model = %model_id,
                        attempt,
                        error = %e,
                        "Transient extraction failure, retrying"
                    );
                    std::thread::sleep(self.retry.delay());
                    attempt += 1;
                }
                Err(source) => {
                    return Err(CatalogingError::ModelUnavailable {
                        stage: Stage::Extraction,
                        source,
                    });
                }
            }
        }
    }
}
