//! Token cost calculation with per-provider charging strategies.
//!
//! Prices are USD per million tokens. Every calculation is a pure function of
//! `(usage, pricing)`; missing inputs cost nothing.
//!
//! ```rust
//! use pprovider::{ChargingStrategy, CostEngine, ModelPricing, TokenUsage};
//!
//! let pricing = ModelPricing::new(3.0, 15.0).with_strategy(ChargingStrategy::ClaudeCaching);
//! let usage = TokenUsage::new(1_000_000, 0);
//! let engine = CostEngine::new();
//!
//! assert_eq!(engine.calculate(Some(&usage), Some(&pricing)), 3.0);
//! assert_eq!(engine.calculate(None, Some(&pricing)), 0.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::TokenUsage;

const PER_MILLION: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChargingStrategy {
    #[default]
    NoCaching,
    ClaudeCaching,
    #[serde(rename = "openai-caching")]
    OpenAiCaching,
    GeminiCaching,
}

impl ChargingStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoCaching => "no-caching",
            Self::ClaudeCaching => "claude-caching",
            Self::OpenAiCaching => "openai-caching",
            Self::GeminiCaching => "gemini-caching",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_price_per_million: f64,
    pub output_price_per_million: f64,
    /// Prompt size above which the `*_above_boundary` prices apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_boundary: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_price_above_boundary: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_price_above_boundary: Option<f64>,
    #[serde(default)]
    pub charging_strategy: ChargingStrategy,
}

impl ModelPricing {
    pub fn new(input_price_per_million: f64, output_price_per_million: f64) -> Self {
        Self {
            input_price_per_million,
            output_price_per_million,
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, charging_strategy: ChargingStrategy) -> Self {
        self.charging_strategy = charging_strategy;
        self
    }

    pub fn with_boundary(mut self, boundary: u64, input_price: f64, output_price: f64) -> Self {
        self.price_boundary = Some(boundary);
        self.input_price_above_boundary = Some(input_price);
        self.output_price_above_boundary = Some(output_price);
        self
    }

    /// Unit prices that apply for a prompt of `prompt_tokens` tokens.
    pub fn unit_prices(&self, prompt_tokens: u64) -> (f64, f64) {
        match self.price_boundary {
            Some(boundary) if prompt_tokens > boundary => (
                self.input_price_above_boundary
                    .unwrap_or(self.input_price_per_million),
                self.output_price_above_boundary
                    .unwrap_or(self.output_price_per_million),
            ),
            _ => (self.input_price_per_million, self.output_price_per_million),
        }
    }
}

/// Computed cost of one provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostInfo {
    pub total_cost: f64,
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
    pub strategy: ChargingStrategy,
    pub usage: TokenUsage,
}

pub trait TokenCostStrategy: Send + Sync {
    fn strategy(&self) -> ChargingStrategy;

    /// Prompt size that selects the pricing tier.
    fn prompt_tokens(&self, usage: &TokenUsage) -> u64 {
        usage.input_tokens
    }

    fn calculate(&self, usage: &TokenUsage, pricing: &ModelPricing) -> f64;
}

/// Every input token at the input price.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCachingStrategy;

impl TokenCostStrategy for NoCachingStrategy {
    fn strategy(&self) -> ChargingStrategy {
        ChargingStrategy::NoCaching
    }

    fn prompt_tokens(&self, usage: &TokenUsage) -> u64 {
        usage.input_tokens + usage.cache_creation_tokens + usage.cache_read_tokens
    }

    fn calculate(&self, usage: &TokenUsage, pricing: &ModelPricing) -> f64 {
        let input = self.prompt_tokens(usage);
        let (input_price, output_price) = pricing.unit_prices(input);
        price(input as f64, input_price) + price(usage.output_tokens as f64, output_price)
    }
}

/// Cache writes at 1.25x and cache reads at 0.1x of the input price.
/// `input_tokens` excludes cached tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClaudeCachingStrategy;

impl ClaudeCachingStrategy {
    pub const CACHE_WRITE_MULTIPLIER: f64 = 1.25;
    pub const CACHE_READ_MULTIPLIER: f64 = 0.1;
}

impl TokenCostStrategy for ClaudeCachingStrategy {
    fn strategy(&self) -> ChargingStrategy {
        ChargingStrategy::ClaudeCaching
    }

    fn prompt_tokens(&self, usage: &TokenUsage) -> u64 {
        usage.input_tokens + usage.cache_creation_tokens + usage.cache_read_tokens
    }

    fn calculate(&self, usage: &TokenUsage, pricing: &ModelPricing) -> f64 {
        let (input_price, output_price) = pricing.unit_prices(self.prompt_tokens(usage));
        let weighted_input = usage.input_tokens as f64
            + usage.cache_creation_tokens as f64 * Self::CACHE_WRITE_MULTIPLIER
            + usage.cache_read_tokens as f64 * Self::CACHE_READ_MULTIPLIER;
        price(weighted_input, input_price) + price(usage.output_tokens as f64, output_price)
    }
}

/// Cached tokens are a subset of `input_tokens`, billed at half price.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiCachingStrategy;

impl OpenAiCachingStrategy {
    pub const CACHE_READ_MULTIPLIER: f64 = 0.5;
}

impl TokenCostStrategy for OpenAiCachingStrategy {
    fn strategy(&self) -> ChargingStrategy {
        ChargingStrategy::OpenAiCaching
    }

    fn calculate(&self, usage: &TokenUsage, pricing: &ModelPricing) -> f64 {
        let (input_price, output_price) = pricing.unit_prices(self.prompt_tokens(usage));
        let cached = usage.cache_read_tokens.min(usage.input_tokens);
        let uncached = usage.input_tokens - cached;
        let weighted_input = uncached as f64 + cached as f64 * Self::CACHE_READ_MULTIPLIER;
        price(weighted_input, input_price) + price(usage.output_tokens as f64, output_price)
    }
}

/// Tiered pricing around `price_boundary`, cache reads at a quarter of the tier price.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeminiCachingStrategy;

impl GeminiCachingStrategy {
    pub const CACHE_READ_MULTIPLIER: f64 = 0.25;
}

impl TokenCostStrategy for GeminiCachingStrategy {
    fn strategy(&self) -> ChargingStrategy {
        ChargingStrategy::GeminiCaching
    }

    fn prompt_tokens(&self, usage: &TokenUsage) -> u64 {
        usage.input_tokens + usage.cache_read_tokens
    }

    fn calculate(&self, usage: &TokenUsage, pricing: &ModelPricing) -> f64 {
        let (input_price, output_price) = pricing.unit_prices(self.prompt_tokens(usage));
        let weighted_input =
            usage.input_tokens as f64 + usage.cache_read_tokens as f64 * Self::CACHE_READ_MULTIPLIER;
        price(weighted_input, input_price) + price(usage.output_tokens as f64, output_price)
    }
}

fn price(tokens: f64, price_per_million: f64) -> f64 {
    tokens / PER_MILLION * price_per_million.max(0.0)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CostEngine;

impl CostEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn strategy_for(&self, strategy: ChargingStrategy) -> &'static dyn TokenCostStrategy {
        match strategy {
            ChargingStrategy::NoCaching => &NoCachingStrategy,
            ChargingStrategy::ClaudeCaching => &ClaudeCachingStrategy,
            ChargingStrategy::OpenAiCaching => &OpenAiCachingStrategy,
            ChargingStrategy::GeminiCaching => &GeminiCachingStrategy,
        }
    }

    pub fn calculate(&self, usage: Option<&TokenUsage>, pricing: Option<&ModelPricing>) -> f64 {
        match (usage, pricing) {
            (Some(usage), Some(pricing)) => self
                .strategy_for(pricing.charging_strategy)
                .calculate(usage, pricing),
            _ => 0.0,
        }
    }

    pub fn cost_info(&self, usage: Option<&TokenUsage>, pricing: Option<&ModelPricing>) -> CostInfo {
        let usage_value = usage.copied().unwrap_or_default();
        let (input_price, output_price) = pricing
            .map(|pricing| {
                let strategy = self.strategy_for(pricing.charging_strategy);
                pricing.unit_prices(strategy.prompt_tokens(&usage_value))
            })
            .unwrap_or((0.0, 0.0));

        CostInfo {
            total_cost: self.calculate(usage, pricing),
            input_cost_per_million: input_price,
            output_cost_per_million: output_price,
            strategy: pricing
                .map(|pricing| pricing.charging_strategy)
                .unwrap_or_default(),
            usage: usage_value,
        }
    }
}
