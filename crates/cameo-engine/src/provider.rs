use async_trait::async_trait;
use cameo_contracts::{GenerationError, GenerationRequest, GenerationResult};

/// One generation backend behind the unified request/result contract.
///
/// `prompt` is the final prompt after any enhancement; implementations must
/// echo it back as `final_prompt`.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        request: &GenerationRequest,
        prompt: &str,
    ) -> Result<GenerationResult, GenerationError>;
}
