use crate::types::ElementSnapshot;
use serde::{Deserialize, Serialize};

/// Logical fields the sequencer knows how to fill.
///
/// Variant order is commit order: the identifier goes first because on the
/// target page committing it appears to initialise state the price input
/// depends on. This is an observed assumption, not a derived one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    Identifier,
    Price,
}

impl FieldRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldRole::Identifier => "identifier",
            FieldRole::Price => "price",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Text,
    Numeric,
}

impl InputKind {
    /// Selector for inputs that can hold a value of this kind.
    pub fn selector(&self) -> &'static str {
        match self {
            InputKind::Text => {
                "input:not([type]), input[type='text'], input[type='search'], textarea"
            }
            InputKind::Numeric => {
                "input:not([type]), input[type='text'], input[type='number'], input[type='tel']"
            }
        }
    }

    /// Same test as [`InputKind::selector`], applied to a snapshot.
    pub fn accepts(&self, snapshot: &ElementSnapshot) -> bool {
        match snapshot.tag_name.as_str() {
            "textarea" => matches!(self, InputKind::Text),
            "input" => {
                let input_type = snapshot.attribute("type").map(str::to_lowercase);
                match input_type.as_deref() {
                    None | Some("text") => true,
                    Some("search") => matches!(self, InputKind::Text),
                    Some("number") | Some("tel") => matches!(self, InputKind::Numeric),
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// Configured locator knowledge for one field, minus the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTemplate {
    pub role: FieldRole,
    pub input_kind: InputKind,
    /// Most specific first.
    pub selectors: Vec<String>,
    pub keywords: Vec<String>,
    /// Site convention for the input's `maxlength`, when there is one.
    #[serde(default)]
    pub max_length: Option<u32>,
}

impl FieldTemplate {
    pub fn with_value(&self, value: impl Into<String>) -> FieldSpec {
        FieldSpec {
            field_id: self.role.as_str().to_string(),
            role: self.role,
            input_kind: self.input_kind,
            candidate_selectors: self.selectors.clone(),
            fallback_keywords: self.keywords.iter().map(|k| k.to_lowercase()).collect(),
            max_length: self.max_length,
            value: value.into(),
        }
    }
}

/// One field to fill in one run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field_id: String,
    pub role: FieldRole,
    pub input_kind: InputKind,
    pub candidate_selectors: Vec<String>,
    /// Lower-cased keywords for text matching.
    pub fallback_keywords: Vec<String>,
    pub max_length: Option<u32>,
    pub value: String,
}

impl FieldSpec {
    /// Case-insensitive substring match against any fallback keyword.
    pub fn matches_keyword(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.fallback_keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && haystack.contains(keyword.as_str()))
    }
}

/// Sort fields into commit order. Stable, so equal roles keep caller order.
pub fn in_commit_order(mut fields: Vec<FieldSpec>) -> Vec<FieldSpec> {
    fields.sort_by_key(|field| field.role);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;

    #[test]
    fn test_keywords_match_case_insensitively() {
        let spec = Config::default().fields.identifier.with_value("SKU-1");
        assert!(spec.matches_keyword("Item Number"));
        assert!(spec.matches_keyword("Your SKU (optional)"));
        assert!(!spec.matches_keyword("Shipping weight"));
    }

    #[test]
    fn test_identifier_sorts_before_price() {
        let config = Config::default();
        let fields = vec![
            config.fields.price.with_value("16.32"),
            config.fields.identifier.with_value("SKU-1"),
        ];
        let ordered = in_commit_order(fields);
        assert_eq!(ordered[0].role, FieldRole::Identifier);
        assert_eq!(ordered[1].role, FieldRole::Price);
        assert_eq!(ordered[1].field_id, "price");
    }
}
