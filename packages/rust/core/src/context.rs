//! Everything a research run needs from the outside world, built once.

use std::path::PathBuf;
use std::sync::Arc;

use researchflow_completion::{OpenAiCompletions, TextCompletion};
use researchflow_search::{ArticleSearch, NewsApiClient};
use researchflow_shared::{AppConfig, Credentials, Result};

/// Collaborators and settings handed to the stages that need them.
#[derive(Clone)]
pub struct ResearchContext {
    pub search: Arc<dyn ArticleSearch>,
    pub completion: Arc<dyn TextCompletion>,
    pub max_tokens: u32,
    pub output_path: PathBuf,
}

impl ResearchContext {
    /// Build the HTTP collaborators from config and resolved credentials.
    pub fn from_config(config: &AppConfig, credentials: &Credentials) -> Result<Self> {
        let search = NewsApiClient::from_config(&config.search, credentials)?;
        let completion = OpenAiCompletions::from_config(&config.completion, credentials)?;

        Ok(Self {
            search: Arc::new(search),
            completion: Arc::new(completion),
            max_tokens: config.completion.max_tokens,
            output_path: config.defaults.output_path.clone(),
        })
    }
}

impl std::fmt::Debug for ResearchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchContext")
            .field("max_tokens", &self.max_tokens)
            .field("output_path", &self.output_path)
            .finish_non_exhaustive()
    }
}
