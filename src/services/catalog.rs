use std::fmt;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A selectable model and where its credential lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub id: &'static str,
    pub provider: ProviderKind,
    pub model: &'static str,
    /// Environment variable names tried in order; the first non-empty wins.
    pub credential_keys: &'static [&'static str],
}

impl ModelConfig {
    /// Human-readable credential name for error messages.
    pub fn credential_label(&self) -> String {
        self.credential_keys.join(" or ")
    }
}

const ANTHROPIC_KEYS: &[&str] = &["ANTHROPIC_API_KEY"];
const OPENAI_KEYS: &[&str] = &["OPENAI_API_KEY"];
const GEMINI_KEYS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

const SUPPORTED_MODELS: &[ModelConfig] = &[
    ModelConfig {
        id: "claude-sonnet-4-20250514",
        provider: ProviderKind::Anthropic,
        model: "claude-sonnet-4-20250514",
        credential_keys: ANTHROPIC_KEYS,
    },
    ModelConfig {
        id: "gpt-4o-mini",
        provider: ProviderKind::OpenAi,
        model: "gpt-4o-mini",
        credential_keys: OPENAI_KEYS,
    },
    ModelConfig {
        id: "gpt-4o",
        provider: ProviderKind::OpenAi,
        model: "gpt-4o",
        credential_keys: OPENAI_KEYS,
    },
    ModelConfig {
        id: "gemini-2.5-flash",
        provider: ProviderKind::Gemini,
        model: "gemini-2.5-flash",
        credential_keys: GEMINI_KEYS,
    },
    ModelConfig {
        id: "gemini-1.5-flash",
        provider: ProviderKind::Gemini,
        model: "gemini-1.5-flash",
        credential_keys: GEMINI_KEYS,
    },
];

/// Read-only lookup table of supported models, built once at startup.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: &'static [ModelConfig],
    default_index: usize,
}

impl ModelCatalog {
    /// Build the catalog. `default_model` must name a supported model,
    /// otherwise the built-in default is used.
    pub fn new(default_model: Option<&str>) -> Self {
        let builtin = Self::index_of(DEFAULT_MODEL).unwrap_or(0);

        let default_index = match default_model {
            Some(id) => Self::index_of(id).unwrap_or_else(|| {
                log::warn!("⚠️ DEFAULT_MODEL '{}' is not supported, using {}", id, DEFAULT_MODEL);
                builtin
            }),
            None => builtin,
        };

        Self {
            models: SUPPORTED_MODELS,
            default_index,
        }
    }

    fn index_of(id: &str) -> Option<usize> {
        SUPPORTED_MODELS.iter().position(|m| m.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn default_model(&self) -> &ModelConfig {
        &self.models[self.default_index]
    }

    /// Resolve a caller-supplied model. Unknown or missing ids fall back to
    /// the default instead of failing.
    pub fn resolve(&self, requested: Option<&str>) -> &ModelConfig {
        requested
            .and_then(|id| self.get(id))
            .unwrap_or_else(|| self.default_model())
    }

    pub fn models(&self) -> &[ModelConfig] {
        self.models
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_model() {
        let catalog = ModelCatalog::default();
        let config = catalog.resolve(Some("gpt-4o-mini"));

        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.credential_keys, &["OPENAI_API_KEY"]);
    }

    #[test]
    fn test_unknown_or_missing_model_uses_default() {
        let catalog = ModelCatalog::default();

        assert_eq!(catalog.resolve(None).id, DEFAULT_MODEL);
        assert_eq!(catalog.resolve(Some("llama-9000")).id, DEFAULT_MODEL);
        assert_eq!(catalog.resolve(Some("")).id, DEFAULT_MODEL);
    }

    #[test]
    fn test_configured_default() {
        let catalog = ModelCatalog::new(Some("gemini-2.5-flash"));
        assert_eq!(catalog.resolve(None).provider, ProviderKind::Gemini);

        let fallback = ModelCatalog::new(Some("not-a-model"));
        assert_eq!(fallback.default_model().id, DEFAULT_MODEL);
    }

    #[test]
    fn test_gemini_accepts_two_credentials() {
        let catalog = ModelCatalog::default();
        let gemini = catalog.get("gemini-2.5-flash").unwrap();

        assert_eq!(gemini.credential_label(), "GEMINI_API_KEY or GOOGLE_API_KEY");
    }

    #[test]
    fn test_every_model_has_a_credential() {
        let catalog = ModelCatalog::default();
        assert!(catalog.models().iter().all(|m| !m.credential_keys.is_empty()));
    }
}
