use crate::consequences::{ConsequenceResult, HookAborter, Message, Parameters};
use std::sync::Arc;

/// Message key used when a disallow action names none
pub const DEFAULT_DISALLOW_MESSAGE: &str = "abusefilter-disallowed";

/// Abort the action with a message, without any other effect
pub struct Disallow {
    parameters: Arc<Parameters>,
    message_key: String,
}

impl Disallow {
    pub(crate) fn new(parameters: Arc<Parameters>, message_key: String) -> Self {
        Self {
            parameters,
            message_key,
        }
    }

    /// # Errors
    ///
    /// Never fails.
    pub async fn execute(&self) -> ConsequenceResult<bool> {
        Ok(true)
    }
}

impl HookAborter for Disallow {
    fn message(&self) -> Message {
        Message::new(self.message_key.clone(), self.parameters.message_params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consequences::FilterRef;
    use crate::consequences::test_support::{parameters_for, registered_specifier};

    #[tokio::test]
    async fn test_disallow_always_fires() {
        let disallow = Disallow::new(
            parameters_for(FilterRef::local(6), registered_specifier()),
            DEFAULT_DISALLOW_MESSAGE.to_string(),
        );
        assert!(disallow.execute().await.unwrap());
        assert_eq!(
            disallow.message(),
            Message::new("abusefilter-disallowed", ["Filter 6", "6"])
        );
    }
}
