use crate::EXECUTOR_TARGET;
use crate::consequences::{ChangeTagger, ConsequenceResult, Parameters};
use std::sync::Arc;
use tracing::debug;

/// Attach change tags to the pending action
pub struct Tag {
    parameters: Arc<Parameters>,
    tags: Vec<String>,
    tagger: Arc<dyn ChangeTagger>,
}

impl Tag {
    pub(crate) fn new(
        parameters: Arc<Parameters>,
        tags: Vec<String>,
        tagger: Arc<dyn ChangeTagger>,
    ) -> Self {
        Self {
            parameters,
            tags,
            tagger,
        }
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// # Errors
    ///
    /// Returns an error if the tagger fails.
    pub async fn execute(&self) -> ConsequenceResult<bool> {
        self.tagger
            .add_tags(self.parameters.specifier(), &self.tags)
            .await?;
        debug!(
            target: EXECUTOR_TARGET,
            filter = %self.parameters.filter_ref(),
            tags = ?self.tags,
            "Tags added"
        );
        Ok(true)
    }
}
