use crate::{EmbedResponse, EmbeddingProvider, ProviderError};

/// Always reports unavailability; classification stays keyword-only.
#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for NoopProvider {
    async fn embed(&self, _texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Err(ProviderError::NotAvailable)
    }
}
