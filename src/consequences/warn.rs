//! Warn consequence: show a warning once per session, then let the action
//! through on retry

use crate::EXECUTOR_TARGET;
use crate::consequences::{
    ConsequenceError, ConsequenceResult, ConsequencesDisabler, HookAborter, Message, Parameters,
    SessionStore,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// Message key used when a warn action names none
pub const DEFAULT_WARNING_MESSAGE: &str = "abusefilter-warning";

pub struct Warn {
    parameters: Arc<Parameters>,
    message_key: String,
    session: Arc<dyn SessionStore>,
    should_warn: Option<bool>,
}

impl Warn {
    pub(crate) fn new(
        parameters: Arc<Parameters>,
        message_key: String,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            parameters,
            message_key,
            session,
            should_warn: None,
        }
    }

    /// Session key of this (page, filter, action) warning
    #[must_use]
    pub fn warn_key(&self) -> String {
        let page_digest = hex::encode(Sha256::digest(
            self.parameters.target().prefixed_text().as_bytes(),
        ));
        format!(
            "abusefilter-warned-{page_digest}-{}-{}",
            self.parameters.filter_ref().global_name(),
            self.parameters.action()
        )
    }

    /// Mark the warning as shown. Returns whether it had to be shown.
    ///
    /// # Errors
    ///
    /// Returns `NotPrechecked` if the check did not run first.
    pub async fn execute(&self) -> ConsequenceResult<bool> {
        let should_warn = self
            .should_warn
            .ok_or(ConsequenceError::NotPrechecked("warn"))?;

        self.session.set(&self.warn_key(), true).await?;
        Ok(should_warn)
    }
}

#[async_trait]
impl ConsequencesDisabler for Warn {
    async fn should_disable_other_consequences(&mut self) -> ConsequenceResult<bool> {
        self.session.persist().await?;
        let key = self.warn_key();
        let warned = self.session.get(&key).await?.unwrap_or(false);

        debug!(
            target: EXECUTOR_TARGET,
            filter = %self.parameters.filter_ref(),
            key = %key,
            warned,
            "Warning checked"
        );
        self.should_warn = Some(!warned);
        Ok(!warned)
    }

    fn sort(&self) -> u32 {
        5
    }
}

impl HookAborter for Warn {
    fn message(&self) -> Message {
        Message::new(self.message_key.clone(), self.parameters.message_params())
    }
}
