use crate::autofill::field::{FieldRole, FieldTemplate, InputKind};
use crate::errors::{AutofillError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub resolution: ResolutionConfig,
    pub readiness: ReadinessConfig,
    pub sequencer: SequencerConfig,
    pub trigger: TriggerConfig,
    pub fields: FieldTemplates,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub disable_images: bool,
    pub args: Vec<String>,
    pub script_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Budgets for the locator strategies and the retry loop around them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub cascade_timeout_ms: u64,
    pub cascade_poll_interval_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub sibling_walk_limit: usize,
    /// Label-like elements with more text than this are treated as layout
    /// containers, not labels.
    pub max_label_text_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Readiness requires strictly more interactive elements than this.
    pub min_interactive_elements: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub settle_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub auto_trigger: bool,
    /// Regexes matched against the URL path of the listing-creation flow.
    pub listing_path_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldTemplates {
    pub identifier: FieldTemplate,
    pub price: FieldTemplate,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution.max_attempts == 0 {
            return Err(AutofillError::ConfigurationError(
                "resolution.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.resolution.cascade_poll_interval_ms == 0 || self.readiness.poll_interval_ms == 0 {
            return Err(AutofillError::ConfigurationError(
                "poll intervals must be non-zero".to_string(),
            ));
        }
        for pattern in &self.trigger.listing_path_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                AutofillError::ConfigurationError(format!("bad path pattern '{}': {}", pattern, e))
            })?;
        }
        for template in [&self.fields.identifier, &self.fields.price] {
            if template.selectors.is_empty() && template.keywords.is_empty() {
                return Err(AutofillError::ConfigurationError(format!(
                    "field '{}' has neither selectors nor keywords",
                    template.role.as_str()
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            resolution: ResolutionConfig::default(),
            readiness: ReadinessConfig::default(),
            sequencer: SequencerConfig::default(),
            trigger: TriggerConfig::default(),
            fields: FieldTemplates::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            user_agent: None,
            disable_images: false,
            args: vec![],
            script_timeout_ms: 5000,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            cascade_timeout_ms: 2000,
            cascade_poll_interval_ms: 250,
            max_attempts: 3,
            backoff_base_ms: 500,
            sibling_walk_limit: 3,
            max_label_text_len: 80,
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            poll_interval_ms: 250,
            min_interactive_elements: 5,
        }
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 300,
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            auto_trigger: true,
            listing_path_patterns: vec![
                r"^/sell/?$".to_string(),
                r"^/listings?/(new|create)/?$".to_string(),
                r"^/items/[^/]+/edit/?$".to_string(),
            ],
        }
    }
}

impl Default for FieldTemplates {
    fn default() -> Self {
        Self {
            identifier: FieldTemplate {
                role: FieldRole::Identifier,
                input_kind: InputKind::Text,
                selectors: vec![
                    "input[data-testid='listing-identifier']".to_string(),
                    "input[name='sku']".to_string(),
                    "input#sku".to_string(),
                    "input[name*='sku']".to_string(),
                    "input[aria-label*='SKU']".to_string(),
                    "input[placeholder*='SKU']".to_string(),
                ],
                keywords: vec![
                    "sku".to_string(),
                    "identifier".to_string(),
                    "item number".to_string(),
                    "product id".to_string(),
                ],
                max_length: Some(50),
            },
            price: FieldTemplate {
                role: FieldRole::Price,
                input_kind: InputKind::Numeric,
                selectors: vec![
                    "input[data-testid='listing-price']".to_string(),
                    "input[name='price']".to_string(),
                    "input#price".to_string(),
                    "input[name*='price']".to_string(),
                    "input[aria-label*='Price']".to_string(),
                    "input[placeholder*='Price']".to_string(),
                ],
                keywords: vec![
                    "listing price".to_string(),
                    "asking price".to_string(),
                    "price".to_string(),
                ],
                max_length: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolution.max_attempts, 3);
        assert_eq!(config.fields.identifier.role, FieldRole::Identifier);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "resolution": {{ "max_attempts": 5 }}, "sequencer": {{ "settle_delay_ms": 0 }} }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.resolution.max_attempts, 5);
        assert_eq!(config.resolution.cascade_poll_interval_ms, 250);
        assert_eq!(config.sequencer.settle_delay_ms, 0);
        assert_eq!(config.readiness.min_interactive_elements, 5);
    }

    #[test]
    fn test_rejects_zero_attempts_and_bad_patterns() {
        let mut config = Config::default();
        config.resolution.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(AutofillError::ConfigurationError(_))
        ));

        let mut config = Config::default();
        config.trigger.listing_path_patterns = vec!["(unclosed".to_string()];
        assert!(config.validate().is_err());
    }
}
