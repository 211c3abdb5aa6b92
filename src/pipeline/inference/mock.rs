use std::collections::VecDeque;
use std::sync::Mutex;

use super::types::{InferenceClient, InferenceRequest};
use super::InferenceError;

type Responder = dyn Fn(&InferenceRequest<'_>) -> Result<String, InferenceError> + Send + Sync;

/// A call observed by [`MockInferenceClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub model_id: String,
    pub mime_type: String,
    pub instruction: String,
    pub image: Vec<u8>,
}

/// Mock inference client for testing.
///
/// Answers from a scripted queue first, then from the responder function.
/// Every call is recorded so tests can assert how many inference calls a
/// pipeline made and with which instruction.
pub struct MockInferenceClient {
    script: Mutex<VecDeque<Result<String, InferenceError>>>,
    responder: Box<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockInferenceClient {
    /// Always answers with the same text.
    pub fn new(response: &str) -> Self {
        let response = response.to_string();
        Self::from_fn(move |_| Ok(response.clone()))
    }

    /// Answers with whatever `responder` returns for the request.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&InferenceRequest<'_>) -> Result<String, InferenceError> + Send + Sync + 'static,
    {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers calls in order; once exhausted, every call is a connection error.
    pub fn scripted(responses: Vec<Result<String, InferenceError>>) -> Self {
        let mock = Self::from_fn(|_| Err(InferenceError::Connection("mock script exhausted".into())));
        if let Ok(mut script) = mock.script.lock() {
            script.extend(responses);
        }
        mock
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Number of calls made with the given model id.
    pub fn calls_for_model(&self, model_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.model_id == model_id)
            .count()
    }
}

impl InferenceClient for MockInferenceClient {
    fn generate(&self, request: &InferenceRequest<'_>) -> Result<String, InferenceError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                model_id: request.model_id.to_string(),
                mime_type: request.mime_type.to_string(),
                instruction: request.instruction.to_string(),
                image: request.image.to_vec(),
            });
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match scripted {
            Some(result) => result,
            None => (self.responder)(request),
        }
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn request<'a>(model: &'a str, image: &'a [u8]) -> InferenceRequest<'a> {
        InferenceRequest {
            model_id: model,
            image,
            mime_type: "image/jpeg",
            instruction: "do it",
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn mock_client_returns_configured_response() {
        let client = MockInferenceClient::new("test response");
        let result = client.generate(&request("m", b"img")).unwrap();
        assert_eq!(result, "test response");
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn scripted_responses_in_order_then_exhausted() {
        let client = MockInferenceClient::scripted(vec![
            Ok("first".into()),
            Err(InferenceError::Timeout { secs: 1 }),
        ]);
        assert_eq!(client.generate(&request("m", b"a")).unwrap(), "first");
        assert!(matches!(
            client.generate(&request("m", b"a")),
            Err(InferenceError::Timeout { secs: 1 })
        ));
        assert!(matches!(
            client.generate(&request("m", b"a")),
            Err(InferenceError::Connection(_))
        ));
    }

    #[test]
    fn from_fn_routes_by_model() {
        let client = MockInferenceClient::from_fn(|req| Ok(format!("model={}", req.model_id)));
        assert_eq!(client.generate(&request("scout", b"a")).unwrap(), "model=scout");
        assert_eq!(client.generate(&request("paid", b"a")).unwrap(), "model=paid");
        assert_eq!(client.calls_for_model("scout"), 1);
    }

    #[test]
    fn records_call_details() {
        let client = MockInferenceClient::new("ok");
        client.generate(&request("m1", b"bytes")).unwrap();
        let calls = client.calls();
        assert_eq!(calls[0].model_id, "m1");
        assert_eq!(calls[0].image, b"bytes".to_vec());
        assert_eq!(calls[0].instruction, "do it");
    }
}
