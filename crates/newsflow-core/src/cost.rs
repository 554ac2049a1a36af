//! Cost accountant: turns the per-step token ledger into an estimated cost.
//!
//! The rate is a blend of two reference price points (USD per million
//! tokens), weighted by the share of traffic expected on the primary model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::flow::FlowStep;
use crate::models::TokenUsage;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_primary")]
    pub primary: ModelPrice,
    #[serde(default = "default_secondary")]
    pub secondary: ModelPrice,
    /// Share of traffic billed at the primary price, in `[0, 1]`.
    #[serde(default = "default_primary_weight")]
    pub primary_weight: f64,
}

fn default_primary() -> ModelPrice {
    ModelPrice {
        input_per_million: 2.5,
        output_per_million: 1.25,
    }
}

fn default_secondary() -> ModelPrice {
    ModelPrice {
        input_per_million: 0.15,
        output_per_million: 0.075,
    }
}

fn default_primary_weight() -> f64 {
    0.2
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            secondary: default_secondary(),
            primary_weight: default_primary_weight(),
        }
    }
}

impl PricingConfig {
    fn weight(&self) -> f64 {
        self.primary_weight.clamp(0.0, 1.0)
    }

    /// Blended USD per million prompt tokens.
    pub fn average_input_cost(&self) -> f64 {
        let w = self.weight();
        self.primary.input_per_million * w + self.secondary.input_per_million * (1.0 - w)
    }

    /// Blended USD per million completion tokens.
    pub fn average_output_cost(&self) -> f64 {
        let w = self.weight();
        self.primary.output_per_million * w + self.secondary.output_per_million * (1.0 - w)
    }

    pub fn cost_of(&self, usage: &TokenUsage) -> f64 {
        (self.average_input_cost() * usage.prompt_tokens as f64 / 1_000_000.0)
            + (self.average_output_cost() * usage.completion_tokens as f64 / 1_000_000.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCost {
    pub step: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostReport {
    pub total_cost: f64,
    pub total_tokens: u64,
    pub steps: Vec<StepCost>,
}

/// Price a token ledger. Empty or partial ledgers are fine; missing steps
/// contribute nothing. Steps are listed in pipeline order, unknown names last.
pub fn calculate_cost(ledger: &BTreeMap<String, TokenUsage>, pricing: &PricingConfig) -> CostReport {
    let mut entries: Vec<(&String, &TokenUsage)> = ledger.iter().collect();
    entries.sort_by_key(|(name, _)| {
        name.parse::<FlowStep>()
            .map(|step| step.rank() as usize * 2 + usize::from(step == FlowStep::Scrape))
            .unwrap_or(usize::MAX)
    });

    let mut report = CostReport::default();
    for (name, usage) in entries {
        let cost = pricing.cost_of(usage);
        report.total_cost += cost;
        report.total_tokens += usage.total();
        report.steps.push(StepCost {
            step: name.clone(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total(),
            cost,
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(entries: &[(&str, u64, u64)]) -> BTreeMap<String, TokenUsage> {
        entries
            .iter()
            .map(|(k, p, c)| (k.to_string(), TokenUsage::new(*p, *c)))
            .collect()
    }

    #[test]
    fn blended_rates_match_reference_weights() {
        let pricing = PricingConfig::default();
        assert!((pricing.average_input_cost() - 0.62).abs() < 1e-12);
        assert!((pricing.average_output_cost() - 0.31).abs() < 1e-12);
    }

    #[test]
    fn discover_only_ledger() {
        let report = calculate_cost(
            &ledger(&[("discover", 1000, 500)]),
            &PricingConfig::default(),
        );
        assert_eq!(report.total_tokens, 1500);
        assert!((report.total_cost - 0.000775).abs() < 1e-12);
        assert_eq!(report.steps.len(), 1);
    }

    #[test]
    fn empty_ledger_costs_nothing() {
        let report = calculate_cost(&BTreeMap::new(), &PricingConfig::default());
        assert_eq!(report.total_tokens, 0);
        assert_eq!(report.total_cost, 0.0);
        assert!(report.steps.is_empty());
    }

    #[test]
    fn steps_sorted_in_pipeline_order() {
        let report = calculate_cost(
            &ledger(&[
                ("write_articles", 1, 1),
                ("custom", 1, 1),
                ("critique", 1, 1),
                ("scrape", 1, 1),
                ("discover", 1, 1),
            ]),
            &PricingConfig::default(),
        );
        let order: Vec<_> = report.steps.iter().map(|s| s.step.as_str()).collect();
        assert_eq!(
            order,
            vec!["discover", "scrape", "critique", "write_articles", "custom"]
        );
        assert_eq!(report.total_tokens, 10);
    }

    #[test]
    fn weight_is_configurable() {
        let pricing = PricingConfig {
            primary_weight: 1.0,
            ..PricingConfig::default()
        };
        let report = calculate_cost(&ledger(&[("discover", 1_000_000, 0)]), &pricing);
        assert!((report.total_cost - 2.5).abs() < 1e-9);
    }
}
