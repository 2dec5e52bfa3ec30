//! The 8 built-in rules shipped when the `trading_rules` table is empty:
//! 4 buy (MA golden cross, RSI oversold, Bollinger lower, MACD golden
//! cross), 4 sell (the mirror image of each).

use super::conditions::{ConditionSpec, Operator, TargetType};
use super::price::{EntrySpec, ExitBase, ExitSpec, PriceSpec};
use super::{RuleKind, TradingRule};

fn ma_cond(field: &str, op: Operator, target_indicator: &str, target_field: &str) -> ConditionSpec {
    ConditionSpec {
        indicator: "MA".into(),
        field: field.into(),
        operator: op,
        target_type: TargetType::Indicator,
        target_indicator: Some(target_indicator.into()),
        target_field: Some(target_field.into()),
        target_value: None,
    }
}

pub fn default_rules() -> Vec<TradingRule> {
    vec![
        TradingRule {
            id: 0,
            name: "MA金叉买入".into(),
            kind: RuleKind::Buy,
            enabled: true,
            priority: 3,
            strength: 3,
            conditions: vec![ma_cond("MA5", Operator::CrossAbove, "MA", "MA20")],
            price_config: PriceSpec {
                entry: EntrySpec::Indicator { indicator: "MA".into(), field: "MA20".into() },
                stop_loss: Some(ExitSpec::Percentage { value: -0.05, base: ExitBase::Entry }),
                take_profit: Some(ExitSpec::Percentage { value: 0.08, base: ExitBase::Entry }),
            },
            description_template: "MA5上穿MA20，形成金叉，建议于 {entry_price} 附近买入".into(),
        },
        TradingRule {
            id: 0,
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
            price_config: PriceSpec {
                entry: EntrySpec::Percentage { value: -0.02 },
                stop_loss: Some(ExitSpec::Percentage { value: -0.05, base: ExitBase::Entry }),
                take_profit: Some(ExitSpec::Percentage { value: 0.05, base: ExitBase::Entry }),
            },
            description_template: "RSI进入超卖区间，建议于 {entry_price} 附近买入".into(),
        },
        TradingRule {
            id: 0,
            name: "布林下轨买入".into(),
            kind: RuleKind::Buy,
            enabled: true,
            priority: 3,
            strength: 3,
            // Placeholder condition kept for wire-format fidelity; actual
            // firing is special-cased in conditions::evaluate_rule against
            // the indicator engine's own below_lower signal.
            conditions: vec![ConditionSpec {
                indicator: "Bollinger".into(),
                field: "lower".into(),
                operator: Operator::Gt,
                target_type: TargetType::Value,
                target_indicator: None,
                target_field: None,
                target_value: Some(0.0),
            }],
            price_config: PriceSpec {
                entry: EntrySpec::Indicator { indicator: "Bollinger".into(), field: "lower".into() },
                stop_loss: Some(ExitSpec::Percentage { value: -0.05, base: ExitBase::Entry }),
                take_profit: Some(ExitSpec::Indicator { indicator: "Bollinger".into(), field: "middle".into() }),
            },
            description_template: "价格跌破布林下轨，建议于 {entry_price} 附近买入".into(),
        },
        TradingRule {
            id: 0,
            name: "MACD金叉买入".into(),
            kind: RuleKind::Buy,
            enabled: true,
            priority: 2,
            strength: 2,
            conditions: vec![ConditionSpec {
                indicator: "MACD".into(),
                field: "DIF".into(),
                operator: Operator::CrossAbove,
                target_type: TargetType::Indicator,
                target_indicator: Some("MACD".into()),
                target_field: Some("DEA".into()),
                target_value: None,
            }],
            price_config: PriceSpec {
                entry: EntrySpec::Current,
                stop_loss: Some(ExitSpec::Percentage { value: -0.05, base: ExitBase::Entry }),
                take_profit: Some(ExitSpec::Percentage { value: 0.08, base: ExitBase::Entry }),
            },
            description_template: "MACD金叉，建议于 {entry_price} 附近买入".into(),
        },
        TradingRule {
            id: 0,
            name: "MA死叉卖出".into(),
            kind: RuleKind::Sell,
            enabled: true,
            priority: 3,
            strength: 3,
            conditions: vec![ma_cond("MA5", Operator::CrossBelow, "MA", "MA20")],
            price_config: PriceSpec {
                entry: EntrySpec::Indicator { indicator: "MA".into(), field: "MA20".into() },
                stop_loss: None,
                take_profit: Some(ExitSpec::Percentage { value: -0.05, base: ExitBase::Entry }),
            },
            description_template: "MA5下穿MA20，形成死叉，建议于 {entry_price} 附近卖出".into(),
        },
        TradingRule {
            id: 0,
            name: "RSI超买卖出".into(),
            kind: RuleKind::Sell,
            enabled: true,
            priority: 2,
            strength: 2,
            conditions: vec![ConditionSpec {
                indicator: "RSI".into(),
                field: "RSI".into(),
                operator: Operator::Gt,
                target_type: TargetType::Value,
                target_indicator: None,
                target_field: None,
                target_value: Some(70.0),
            }],
            price_config: PriceSpec {
                entry: EntrySpec::Percentage { value: 0.02 },
                stop_loss: None,
                take_profit: Some(ExitSpec::Percentage { value: -0.02, base: ExitBase::Entry }),
            },
            description_template: "RSI进入超买区间，建议于 {entry_price} 附近卖出".into(),
        },
        TradingRule {
            id: 0,
            name: "布林上轨卖出".into(),
            kind: RuleKind::Sell,
            enabled: true,
            priority: 3,
            strength: 3,
            conditions: vec![ConditionSpec {
                indicator: "Bollinger".into(),
                field: "upper".into(),
                operator: Operator::Lt,
                target_type: TargetType::Value,
                target_indicator: None,
                target_field: None,
                target_value: Some(0.0),
            }],
            price_config: PriceSpec {
                entry: EntrySpec::Indicator { indicator: "Bollinger".into(), field: "upper".into() },
                stop_loss: None,
                take_profit: Some(ExitSpec::Indicator { indicator: "Bollinger".into(), field: "middle".into() }),
            },
            description_template: "价格突破布林上轨，建议于 {entry_price} 附近卖出".into(),
        },
        TradingRule {
            id: 0,
            name: "MACD死叉卖出".into(),
            kind: RuleKind::Sell,
            enabled: true,
            priority: 2,
            strength: 2,
            conditions: vec![ConditionSpec {
                indicator: "MACD".into(),
                field: "DIF".into(),
                operator: Operator::CrossBelow,
                target_type: TargetType::Indicator,
                target_indicator: Some("MACD".into()),
                target_field: Some("DEA".into()),
                target_value: None,
            }],
            price_config: PriceSpec {
                entry: EntrySpec::Current,
                stop_loss: None,
                take_profit: Some(ExitSpec::Percentage { value: -0.05, base: ExitBase::Entry }),
            },
            description_template: "MACD死叉，建议于 {entry_price} 附近卖出".into(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ships_exactly_eight_rules_split_four_four() {
        let rules = default_rules();
        assert_eq!(rules.len(), 8);
        assert_eq!(rules.iter().filter(|r| r.kind == RuleKind::Buy).count(), 4);
        assert_eq!(rules.iter().filter(|r| r.kind == RuleKind::Sell).count(), 4);
    }
}
