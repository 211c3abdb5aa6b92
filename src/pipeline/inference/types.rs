use std::time::Duration;

use super::InferenceError;

/// One outbound inference call.
#[derive(Debug, Clone, Copy)]
pub struct InferenceRequest<'a> {
    /// Opaque model identifier, resolved outside the client.
    pub model_id: &'a str,
    pub image: &'a [u8],
    pub mime_type: &'a str,
    pub instruction: &'a str,
    /// Caller-supplied deadline for the whole call.
    pub timeout: Duration,
}

/// Vision-capable text generation backend (allows mocking).
pub trait InferenceClient: Send + Sync {
    /// Send the image and instruction, return the model's raw text.
    fn generate(&self, request: &InferenceRequest<'_>) -> Result<String, InferenceError>;

    /// Short backend label for logs ("ollama", "gemini", "mock").
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trait_is_object_safe() {
        fn _assert_client(_: &dyn InferenceClient) {}
    }
}
