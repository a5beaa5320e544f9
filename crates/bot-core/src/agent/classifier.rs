use std::future::Future;
use std::pin::Pin;

use super::game_api::ApiFuture;
use super::prompt::{build_classification_prompt, PromptConfig, StatusContext};

pub trait LlmClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        prompt: String,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}

/// Maps an owner message plus status context to raw text holding an intent JSON document.
pub trait IntentClassifier: Send + Sync {
    fn classify<'a>(
        &'a self,
        status: StatusContext,
        issuer: &'a str,
        message: &'a str,
    ) -> ApiFuture<'a, String>;
}

/// Classifier backed by a completion model.
pub struct LlmIntentClassifier<L> {
    llm: L,
    bot_name: String,
    prompt_cfg: PromptConfig,
}

impl<L: LlmClient> LlmIntentClassifier<L> {
    pub fn new(llm: L, bot_name: impl Into<String>) -> Self {
        Self {
            llm,
            bot_name: bot_name.into(),
            prompt_cfg: PromptConfig::default(),
        }
    }

    pub fn with_prompt(mut self, prompt_cfg: PromptConfig) -> Self {
        self.prompt_cfg = prompt_cfg;
        self
    }
}

impl<L: LlmClient> IntentClassifier for LlmIntentClassifier<L> {
    fn classify<'a>(
        &'a self,
        status: StatusContext,
        issuer: &'a str,
        message: &'a str,
    ) -> ApiFuture<'a, String> {
        Box::pin(async move {
            let prompt = build_classification_prompt(
                &self.prompt_cfg,
                &self.bot_name,
                issuer,
                &status,
                message,
            );
            let raw = self.llm.complete(prompt).await?;
            tracing::debug!(raw = %raw, "agent.classify.raw");
            Ok(raw)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeLlm {
        responses: Mutex<VecDeque<anyhow::Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl LlmClient for FakeLlm {
        fn complete<'a>(
            &'a self,
            prompt: String,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
            Box::pin(async move {
                self.prompts.lock().unwrap().push(prompt);
                self.responses
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| anyhow::bail!("no llm response queued"))
            })
        }
    }

    #[tokio::test]
    async fn classifier_prompts_once_and_returns_raw_text() -> anyhow::Result<()> {
        let llm = FakeLlm::default();
        llm.responses
            .lock()
            .unwrap()
            .push_back(Ok("{\"type\":\"command\",\"command\":\"come\"}".to_string()));
        let classifier = LlmIntentClassifier::new(llm, "Altes");

        let raw = classifier
            .classify(StatusContext::default(), "steve", "come here")
            .await?;
        assert!(raw.contains("come"));

        let prompts = classifier.llm.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("come here"));
        Ok(())
    }

    #[tokio::test]
    async fn classifier_surfaces_transport_errors() {
        let classifier = LlmIntentClassifier::new(FakeLlm::default(), "Altes");
        let err = classifier
            .classify(StatusContext::default(), "steve", "hi")
            .await;
        assert!(err.is_err());
    }
}
