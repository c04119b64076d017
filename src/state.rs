//! Shared application state: the question generator and the book library.
//!
//! Generic over the model backend so the router can be driven by a scripted
//! backend in tests and by `Gemini` in production.

use std::sync::Arc;

use tracing::info;

use crate::client::GenerativeBackend;
use crate::config::{load_generation_config_from_env, GeminiConfig, ServerConfig};
use crate::error::Result;
use crate::gemini::Gemini;
use crate::library::BookLibrary;
use crate::pipeline::QuestionGenerator;

pub struct AppState<B> {
    pub generator: QuestionGenerator<B>,
    pub library: BookLibrary,
}

impl<B: GenerativeBackend> AppState<B> {
    pub fn new(generator: QuestionGenerator<B>, library: BookLibrary) -> Self {
        Self { generator, library }
    }
}

impl AppState<Gemini> {
    /// Production state from the environment. Fails when GEMINI_API_KEY is absent
    /// or the upload directory cannot be created.
    pub async fn from_env(server: &ServerConfig) -> Result<Arc<Self>> {
        let gemini_cfg = GeminiConfig::from_env()?;
        let gemini = Gemini::new(gemini_cfg)?;
        info!(target: "exam_forge", model = %gemini.model(), base_url = %gemini.base_url(), "Gemini client ready");

        let generation = load_generation_config_from_env().unwrap_or_default();
        let library = BookLibrary::open(&server.upload_dir).await?;

        Ok(Arc::new(Self::new(QuestionGenerator::new(gemini, generation), library)))
    }
}
