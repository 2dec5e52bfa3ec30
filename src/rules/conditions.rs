//! Tagged-union condition evaluation, including cross detection (which
//! recomputes indicators on `series[:-1]` and compares pairwise with
//! today's value).

use super::TradingRule;
use crate::indicators::{self, IndicatorReport, SignalEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    /// Semantic alias for `Lt` against a fixed threshold.
    BelowThreshold,
    /// Semantic alias for `Gt` against a fixed threshold.
    AboveThreshold,
    CrossAbove,
    CrossBelow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Indicator,
    Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub indicator: String,
    pub field: String,
    pub operator: Operator,
    pub target_type: TargetType,
    pub target_indicator: Option<String>,
    pub target_field: Option<String>,
    pub target_value: Option<f64>,
}

/// Reads a named field out of an already-computed indicator report, e.g.
/// `("MA", "MA5")`, `("MACD", "DIF")`, `("Bollinger", "lower")`.
pub fn get_indicator_value(report: &IndicatorReport, indicator: &str, field: &str) -> Option<f64> {
    match indicator {
        "MA" => report.ma.get(field).copied(),
        "MACD" => report.macd.as_ref().and_then(|m| match field {
            "DIF" => Some(m.dif),
            "DEA" => Some(m.dea),
            "MACD" => Some(m.macd),
            _ => None,
        }),
        "RSI" => report.rsi,
        "KDJ" => report.kdj.as_ref().and_then(|k| match field {
            "K" => Some(k.k),
            "D" => Some(k.d),
            "J" => Some(k.j),
            _ => None,
        }),
        "Bollinger" => report.bollinger.as_ref().and_then(|b| match field {
            "upper" => Some(b.upper),
            "middle" => Some(b.middle),
            "lower" => Some(b.lower),
            "width" => Some(b.width),
            _ => None,
        }),
        _ => None,
    }
}

fn compare(op: Operator, left: f64, right: f64) -> bool {
    match op {
        Operator::Gt | Operator::AboveThreshold => left > right,
        Operator::Lt | Operator::BelowThreshold => left < right,
        Operator::Gte => left >= right,
        Operator::Lte => left <= right,
        Operator::Eq => (left - right).abs() < 1e-9,
        Operator::CrossAbove | Operator::CrossBelow => unreachable!("handled separately"),
    }
}

fn resolve_right(
    cond: &ConditionSpec,
    report: &IndicatorReport,
) -> Option<f64> {
    match cond.target_type {
        TargetType::Value => cond.target_value,
        TargetType::Indicator => {
            let indicator = cond.target_indicator.as_deref().unwrap_or(&cond.indicator);
            let field = cond.target_field.as_deref().unwrap_or(&cond.field);
            get_indicator_value(report, indicator, field)
        }
    }
}

fn evaluate_cross(
    cond: &ConditionSpec,
    closes: &[f64],
    highs: &[f64],
    lows: &[f64],
    report: &IndicatorReport,
) -> bool {
    if closes.len() < 20 {
        return false;
    }
    let prev_report = indicators::calc_all(&closes[..closes.len() - 1], &highs[..highs.len() - 1], &lows[..lows.len() - 1]);

    let curr_left = get_indicator_value(report, &cond.indicator, &cond.field);
    let curr_right = resolve_right(cond, report);
    let prev_left = get_indicator_value(&prev_report, &cond.indicator, &cond.field);
    let target_indicator = cond.target_indicator.as_deref().unwrap_or(&cond.indicator);
    let target_field = cond.target_field.as_deref().unwrap_or(&cond.field);
    let prev_right = match cond.target_type {
        TargetType::Value => cond.target_value,
        TargetType::Indicator => get_indicator_value(&prev_report, target_indicator, target_field),
    };

    match (curr_left, curr_right, prev_left, prev_right) {
        (Some(cl), Some(cr), Some(pl), Some(pr)) => match cond.operator {
            Operator::CrossAbove => pl <= pr && cl > cr,
            Operator::CrossBelow => pl >= pr && cl < cr,
            _ => false,
        },
        _ => false,
    }
}

fn evaluate_condition(
    cond: &ConditionSpec,
    closes: &[f64],
    highs: &[f64],
    lows: &[f64],
    report: &IndicatorReport,
) -> bool {
    match cond.operator {
        Operator::CrossAbove | Operator::CrossBelow => evaluate_cross(cond, closes, highs, lows, report),
        _ => {
            let left = get_indicator_value(report, &cond.indicator, &cond.field);
            let right = resolve_right(cond, report);
            match (left, right) {
                (Some(l), Some(r)) => compare(cond.operator, l, r),
                _ => false,
            }
        }
    }
}

/// AND-composes every condition on the rule. Special-cases the two default
/// Bollinger rules, whose stored `target_value: 0` placeholder does not
/// literally express "price below lower band" — those fire off the
/// indicator engine's own `below_lower`/`above_upper` events instead, per
/// the known divergence in the upstream rule set.
pub fn evaluate_rule(
    rule: &TradingRule,
    closes: &[f64],
    highs: &[f64],
    lows: &[f64],
    report: &IndicatorReport,
) -> bool {
    if rule.name.contains("布林") {
        let want = if rule.name.contains("买入") {
            SignalEvent::BelowLower
        } else {
            SignalEvent::AboveUpper
        };
        return report.signals.iter().any(|s| s.event == want);
    }

    rule.conditions
        .iter()
        .all(|c| evaluate_condition(c, closes, highs, lows, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::price::PriceSpec;
    use crate::rules::RuleKind;

    fn rsi_oversold_rule() -> TradingRule {
        TradingRule {
            id: 1,
            name: "RSI超卖买入".into(),
            kind: RuleKind::Buy,
            enabled: true,
            priority: 2,
            strength: 2,
            conditions: vec![ConditionSpec {
                indicator: "RSI".into(),
                field: "RSI".into(),
                operator: Operator::Lt,
                target_type: TargetType::Value,
                target_indicator: None,
                target_field: None,
                target_value: Some(30.0),
            }],
            price_config: PriceSpec::default_percentage_entry(-0.02),
            description_template: "RSI超卖".into(),
        }
    }

    #[test]
    fn threshold_condition_fires() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let report = indicators::calc_all(&closes, &closes, &closes);
        let rule = rsi_oversold_rule();
        assert!(evaluate_rule(&rule, &closes, &closes, &closes, &report));
    }
}
