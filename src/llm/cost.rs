//! Cost calculation for reasoning calls.
//!
//! Prices are USD per one million tokens.

use super::service::Usage;

/// Input/output price pair for a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

const PRICING: &[(&str, ModelPricing)] = &[
    (
        "claude-opus-4",
        ModelPricing {
            input_per_million: 15.00,
            output_per_million: 75.00,
        },
    ),
    (
        "claude-3-5-sonnet",
        ModelPricing {
            input_per_million: 3.00,
            output_per_million: 15.00,
        },
    ),
    (
        "claude-sonnet-4",
        ModelPricing {
            input_per_million: 3.00,
            output_per_million: 15.00,
        },
    ),
    (
        "claude-3-haiku",
        ModelPricing {
            input_per_million: 0.25,
            output_per_million: 1.25,
        },
    ),
    (
        "gpt-4o-mini",
        ModelPricing {
            input_per_million: 0.15,
            output_per_million: 0.60,
        },
    ),
    (
        "gpt-4o",
        ModelPricing {
            input_per_million: 2.50,
            output_per_million: 10.00,
        },
    ),
];

/// Unknown hosted models are billed at the most expensive known tier.
const FALLBACK_PRICING: ModelPricing = ModelPricing {
    input_per_million: 15.00,
    output_per_million: 75.00,
};

const FREE: ModelPricing = ModelPricing {
    input_per_million: 0.0,
    output_per_million: 0.0,
};

/// Look up pricing by model id prefix (dated ids like
/// `claude-3-haiku-20240307` match their family).
pub fn pricing_for(model: &str, local: bool) -> ModelPricing {
    if local {
        return FREE;
    }
    let model = model.to_lowercase();
    PRICING
        .iter()
        .filter(|(prefix, _)| model.starts_with(prefix))
        // Longest prefix wins so "gpt-4o-mini" is not priced as "gpt-4o".
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, p)| *p)
        .unwrap_or(FALLBACK_PRICING)
}

/// Calculate cost in USD for the given usage, rounded to 6 decimals.
pub fn calculate_cost(model: &str, usage: Usage, local: bool) -> f64 {
    let pricing = pricing_for(model, local);
    let input_cost = (usage.input_tokens as f64 / 1_000_000.0) * pricing.input_per_million;
    let output_cost = (usage.output_tokens as f64 / 1_000_000.0) * pricing.output_per_million;
    ((input_cost + output_cost) * 1_000_000.0).round() / 1_000_000.0
}

/// Format cost for display.
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("${:.4}", cost)
    } else if cost < 1.0 {
        format!("${:.3}", cost)
    } else {
        format!("${:.2}", cost)
    }
}
