use crate::autofill::field::FieldSpec;
use crate::core::config::FieldTemplates;
use crate::errors::{AutofillError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;

pub const TITLE_KEY: &str = "listing_title";
pub const IDENTIFIER_KEY: &str = "listing_identifier";
pub const PRICE_KEY: &str = "listing_price";
pub const COST_BASIS_KEY: &str = "cost_basis";
pub const FLAT_COST_KEY: &str = "flat_cost";
pub const TAX_RATE_KEY: &str = "tax_rate";
pub const PLATFORM_FEE_RATE_KEY: &str = "platform_fee_rate";
pub const PROMO_DISCOUNT_RATE_KEY: &str = "promo_discount_rate";
pub const TARGET_PROFIT_RATE_KEY: &str = "target_profit_rate";

/// Every key a run reads.
pub const RUN_KEYS: [&str; 9] = [
    TITLE_KEY,
    IDENTIFIER_KEY,
    PRICE_KEY,
    COST_BASIS_KEY,
    FLAT_COST_KEY,
    TAX_RATE_KEY,
    PLATFORM_FEE_RATE_KEY,
    PROMO_DISCOUNT_RATE_KEY,
    TARGET_PROFIT_RATE_KEY,
];

/// External key-value store holding the input values for a run.
#[async_trait]
pub trait ValueSource: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Read `keys` together. Sources backed by a single document override
    /// this so one run sees one version of it.
    async fn snapshot(&self, keys: &[&str]) -> Result<ValueSnapshot> {
        let mut values = Map::new();
        for key in keys {
            if let Some(value) = self.get(key).await? {
                values.insert(key.to_string(), value);
            }
        }
        Ok(ValueSnapshot { values })
    }
}

/// Values read from a [`ValueSource`] at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSnapshot {
    values: Map<String, Value>,
}

impl ValueSnapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Non-blank string, or a number rendered as text.
    fn text(&self, key: &str) -> Option<String> {
        match self.values.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    fn number(&self, key: &str) -> Result<Option<f64>> {
        let value = match self.values.get(key) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) if !s.trim().is_empty() => {
                Some(s.trim().parse::<f64>().map_err(|_| {
                    AutofillError::ValueStore(format!("{} is not a number: {:?}", key, s))
                })?)
            }
            _ => None,
        };
        Ok(value)
    }
}

#[derive(Debug, Default)]
pub struct MemoryValueStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.values.write().insert(key.to_string(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }
}

#[async_trait]
impl ValueSource for MemoryValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn snapshot(&self, keys: &[&str]) -> Result<ValueSnapshot> {
        let values = self.values.read();
        Ok(ValueSnapshot {
            values: keys
                .iter()
                .filter_map(|key| Some((key.to_string(), values.get(*key)?.clone())))
                .collect(),
        })
    }
}

/// A JSON object on disk. Read afresh for every lookup or snapshot so edits
/// made between runs are picked up and nothing is carried over.
#[derive(Debug, Clone)]
pub struct JsonFileValueStore {
    path: PathBuf,
}

impl JsonFileValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<Map<String, Value>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        match serde_json::from_str(&raw)? {
            Value::Object(map) => Ok(map),
            other => Err(AutofillError::ValueStore(format!(
                "{} must hold a JSON object, found {}",
                self.path.display(),
                kind_of(&other)
            ))),
        }
    }
}

#[async_trait]
impl ValueSource for JsonFileValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load().await?.remove(key))
    }

    async fn snapshot(&self, keys: &[&str]) -> Result<ValueSnapshot> {
        let mut document = self.load().await?;
        document.retain(|key, _| keys.contains(&key.as_str()));
        Ok(ValueSnapshot { values: document })
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Inputs for the derived listing price. Rates are fractions (0.08 = 8%).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceInputs {
    pub cost_basis: f64,
    pub flat_cost: f64,
    pub tax_rate: f64,
    pub platform_fee_rate: f64,
    pub promo_discount_rate: f64,
    pub target_profit_rate: f64,
}

impl PriceInputs {
    /// `(cost + flat) * (1 + tax + fee + profit - promo)`, rounded to cents.
    pub fn derived_price(&self) -> f64 {
        let multiplier = 1.0 + self.tax_rate + self.platform_fee_rate + self.target_profit_rate
            - self.promo_discount_rate;
        round_cents((self.cost_basis + self.flat_cost) * multiplier)
    }

    pub async fn load(source: &dyn ValueSource) -> Result<Option<Self>> {
        Self::from_snapshot(&source.snapshot(&RUN_KEYS).await?)
    }

    /// `None` without a cost basis. Missing adjustments count as zero.
    pub fn from_snapshot(values: &ValueSnapshot) -> Result<Option<Self>> {
        let Some(cost_basis) = values.number(COST_BASIS_KEY)? else {
            return Ok(None);
        };
        Ok(Some(Self {
            cost_basis,
            flat_cost: values.number(FLAT_COST_KEY)?.unwrap_or(0.0),
            tax_rate: values.number(TAX_RATE_KEY)?.unwrap_or(0.0),
            platform_fee_rate: values.number(PLATFORM_FEE_RATE_KEY)?.unwrap_or(0.0),
            promo_discount_rate: values.number(PROMO_DISCOUNT_RATE_KEY)?.unwrap_or(0.0),
            target_profit_rate: values.number(TARGET_PROFIT_RATE_KEY)?.unwrap_or(0.0),
        }))
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Values for one run, title precondition already checked.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValues {
    pub title: String,
    pub identifier: Option<String>,
    pub price: Option<String>,
}

impl FieldValues {
    /// Read everything a run needs in one snapshot. The title is checked
    /// before any other key; without it the run must not start.
    pub async fn load(source: &dyn ValueSource) -> Result<Self> {
        let values = source.snapshot(&RUN_KEYS).await?;
        let title = values
            .text(TITLE_KEY)
            .ok_or_else(|| AutofillError::MissingPrecondition(TITLE_KEY.to_string()))?;

        let identifier = values.text(IDENTIFIER_KEY);
        let price = match values.text(PRICE_KEY) {
            Some(price) => Some(price),
            None => PriceInputs::from_snapshot(&values)?
                .map(|inputs| format!("{:.2}", inputs.derived_price())),
        };

        Ok(Self {
            title,
            identifier,
            price,
        })
    }

    pub fn has_fillable(&self) -> bool {
        self.identifier.is_some() || self.price.is_some()
    }

    /// One spec per available value. Absent values are left out of the run.
    pub fn field_specs(&self, templates: &FieldTemplates) -> Vec<FieldSpec> {
        let mut specs = Vec::new();
        if let Some(identifier) = &self.identifier {
            specs.push(templates.identifier.with_value(identifier.clone()));
        }
        if let Some(price) = &self.price {
            specs.push(templates.price.with_value(price.clone()));
        }
        specs
    }
}
