//! JSON-declared buy/sell rule evaluation.
//!
//! Rules are tagged unions over `ConditionOperator` and `PriceSpec` kind,
//! parsed once when loaded from storage and kept in their compiled form —
//! the upstream source re-parses the JSON blob on every evaluation, which
//! this design replaces with a one-time deserialization into these structs.

pub mod conditions;
pub mod defaults;
pub mod price;

use crate::indicators::IndicatorReport;
use conditions::ConditionSpec;
use price::PriceSpec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingRule {
    pub id: i64,
    pub name: String,
    pub kind: RuleKind,
    pub enabled: bool,
    pub priority: i32,
    pub strength: u8,
    pub conditions: Vec<ConditionSpec>,
    pub price_config: PriceSpec,
    pub description_template: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleFireResult {
    pub rule_id: i64,
    pub rule_name: String,
    pub kind: RuleKind,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub strength: u8,
    pub priority: i32,
    pub triggers: Vec<String>,
    pub message: String,
}

/// Evaluates every enabled rule in priority-descending order and returns the
/// single best-firing one (buy preferred over sell on a tie), or `None` if
/// nothing fires — callers translate `None` into a `hold`/strength-0 signal.
pub fn evaluate_all(
    rules: &[TradingRule],
    closes: &[f64],
    highs: &[f64],
    lows: &[f64],
    current_price: f64,
    indicators: &IndicatorReport,
) -> Option<RuleFireResult> {
    let mut sorted: Vec<&TradingRule> = rules.iter().filter(|r| r.enabled).collect();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut buy_candidates = Vec::new();
    let mut sell_candidates = Vec::new();

    for rule in sorted {
        let fired = conditions::evaluate_rule(rule, closes, highs, lows, indicators);
        if !fired {
            continue;
        }
        let entry_price = price::calculate_entry_price(&rule.price_config, current_price, indicators);
        let stop_loss = price::calculate_stop_loss(&rule.price_config, current_price, entry_price, indicators);
        let take_profit = price::calculate_take_profit(&rule.price_config, current_price, entry_price, indicators);

        let message = if rule.description_template.contains("{entry_price}") {
            rule.description_template.replace("{entry_price}", &format!("{entry_price:.2}"))
        } else {
            rule.description_template.clone()
        };

        let result = RuleFireResult {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            kind: rule.kind,
            entry_price,
            stop_loss,
            take_profit,
            strength: rule.strength,
            priority: rule.priority,
            triggers: vec![rule.name.clone()],
            message,
        };

        match rule.kind {
            RuleKind::Buy => buy_candidates.push(result),
            RuleKind::Sell => sell_candidates.push(result),
        }
    }

    let pick_best = |mut v: Vec<RuleFireResult>| -> Option<RuleFireResult> {
        v.sort_by(|a, b| (a.priority, a.strength).cmp(&(b.priority, b.strength)));
        v.pop()
    };

    pick_best(buy_candidates).or_else(|| pick_best(sell_candidates))
}
