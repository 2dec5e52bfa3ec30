//! Entry/stop-loss/take-profit price formulas.

use crate::indicators::IndicatorReport;
use crate::rules::conditions::get_indicator_value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitBase {
    Entry,
    Current,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntrySpec {
    Indicator { indicator: String, field: String },
    Percentage { value: f64 },
    Current,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExitSpec {
    Indicator { indicator: String, field: String },
    Percentage { value: f64, base: ExitBase },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSpec {
    pub entry: EntrySpec,
    pub stop_loss: Option<ExitSpec>,
    pub take_profit: Option<ExitSpec>,
}

impl PriceSpec {
    #[cfg(test)]
    pub fn default_percentage_entry(value: f64) -> Self {
        PriceSpec {
            entry: EntrySpec::Percentage { value },
            stop_loss: None,
            take_profit: None,
        }
    }
}

pub fn calculate_entry_price(spec: &PriceSpec, current_price: f64, report: &IndicatorReport) -> f64 {
    let raw = match &spec.entry {
        EntrySpec::Current => current_price,
        EntrySpec::Percentage { value } => current_price * (1.0 + value),
        EntrySpec::Indicator { indicator, field } => {
            get_indicator_value(report, indicator, field).unwrap_or(current_price)
        }
    };
    (raw * 100.0).round() / 100.0
}

fn calculate_exit(
    exit: &ExitSpec,
    current_price: f64,
    entry_price: f64,
    report: &IndicatorReport,
) -> Option<f64> {
    let raw = match exit {
        ExitSpec::Indicator { indicator, field } => get_indicator_value(report, indicator, field)?,
        ExitSpec::Percentage { value, base } => {
            let base_price = match base {
                ExitBase::Entry => entry_price,
                ExitBase::Current => current_price,
            };
            base_price * (1.0 + value)
        }
    };
    Some((raw * 100.0).round() / 100.0)
}

pub fn calculate_stop_loss(
    spec: &PriceSpec,
    current_price: f64,
    entry_price: f64,
    report: &IndicatorReport,
) -> Option<f64> {
    spec.stop_loss
        .as_ref()
        .and_then(|e| calculate_exit(e, current_price, entry_price, report))
}

pub fn calculate_take_profit(
    spec: &PriceSpec,
    current_price: f64,
    entry_price: f64,
    report: &IndicatorReport,
) -> Option<f64> {
    spec.take_profit
        .as_ref()
        .and_then(|e| calculate_exit(e, current_price, entry_price, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorReport;

    #[test]
    fn percentage_entry_rounds_to_cents() {
        let spec = PriceSpec {
            entry: EntrySpec::Percentage { value: -0.02 },
            stop_loss: None,
            take_profit: None,
        };
        let entry = calculate_entry_price(&spec, 100.0, &IndicatorReport::default());
        assert_eq!(entry, 98.0);
    }

    #[test]
    fn percentage_exit_bases_off_entry() {
        let spec = PriceSpec {
            entry: EntrySpec::Current,
            stop_loss: Some(ExitSpec::Percentage { value: -0.05, base: ExitBase::Entry }),
            take_profit: None,
        };
        let entry = calculate_entry_price(&spec, 100.0, &IndicatorReport::default());
        let sl = calculate_stop_loss(&spec, 100.0, entry, &IndicatorReport::default());
        assert_eq!(sl, Some(95.0));
    }
}
