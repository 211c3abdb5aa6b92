pub mod inference; // Vision-model clients (Ollama, Gemini, mock)
pub mod templates; // Template store + per-batch resolver
pub mod cataloging; // Classifier, Extractor, Normalizer
pub mod batch; // Worklist, tiers, item state machine, orchestrator
