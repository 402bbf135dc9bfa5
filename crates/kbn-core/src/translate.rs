use async_trait::async_trait;
use tracing::warn;

use crate::Result;

/// Translation port. The OpenAI adapter is the production implementation.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
}

/// Translate `text`, folding failures into the returned string.
///
/// Empty input short-circuits to an empty string without calling the
/// translator. Errors become `[Translation error: ...]` so a failed
/// translation never fails the surrounding request.
pub async fn translate_or_inline(translator: &dyn Translator, text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    match translator.translate(text).await {
        Ok(t) => t,
        Err(e) => {
            warn!("translation failed: {e}");
            format!("[Translation error: {e}]")
        }
    }
}

/// Fixed prompts sent with every translation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationPrompt {
    pub source_language: String,
    pub target_language: String,
}

impl TranslationPrompt {
    pub fn new(source_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "You are a professional translator. Translate the text from {} into {}. \
             Preserve the structure and formatting of the text.",
            self.source_language, self.target_language
        )
    }

    pub fn user_prompt(&self, text: &str) -> String {
        format!("Translate this text into {}:\n\n{text}", self.target_language)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::errors::Error;

    /// Prefixes the input with `[mhr] `, or fails every call.
    #[derive(Default)]
    pub struct FakeTranslator {
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeTranslator {
        pub fn failing() -> Self {
            Self {
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Translator for FakeTranslator {
        async fn translate(&self, text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::External("openai request error: timed out".into()));
            }
            Ok(format!("[mhr] {text}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeTranslator;
    use super::*;

    #[tokio::test]
    async fn empty_text_skips_the_translator() {
        let t = FakeTranslator::default();
        assert_eq!(translate_or_inline(&t, "  ").await, "");
        assert_eq!(t.calls(), 0);
    }

    #[tokio::test]
    async fn failures_are_inlined() {
        let t = FakeTranslator::failing();
        let out = translate_or_inline(&t, "Привет").await;
        assert!(out.starts_with("[Translation error: "));
        assert!(out.contains("timed out"));
    }

    #[test]
    fn prompts_name_both_languages() {
        let p = TranslationPrompt::new("Russian", "Meadow Mari");
        assert!(p.system_prompt().contains("from Russian into Meadow Mari"));
        assert!(p.user_prompt("текст").ends_with("\n\nтекст"));
    }
}
