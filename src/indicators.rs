//! MA/MACD/RSI/KDJ/Bollinger computation and cross detection.
//!
//! All numeric results are rounded to two decimals (four for the MACD
//! internals). Insufficient history yields an empty indicator block and no
//! signals — this engine never errors on short series.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalEvent {
    GoldenCross,
    DeadCross,
    Oversold,
    Overbought,
    BelowLower,
    AboveUpper,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedSignal {
    pub event: SignalEvent,
    pub name: &'static str,
    pub indicator: &'static str,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MacdValues {
    pub dif: f64,
    pub dea: f64,
    pub macd: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KdjValues {
    pub k: f64,
    pub d: f64,
    pub j: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BollingerValues {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorReport {
    pub ma: BTreeMap<String, f64>,
    pub macd: Option<MacdValues>,
    pub rsi: Option<f64>,
    pub kdj: Option<KdjValues>,
    pub bollinger: Option<BollingerValues>,
    pub signals: Vec<DetectedSignal>,
    pub current_price: Option<f64>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

fn mean(slice: &[f64]) -> f64 {
    slice.iter().sum::<f64>() / slice.len() as f64
}

/// Rolling EMA with `adjust=False` semantics: seeded with the first value,
/// then `ema[i] = alpha*x[i] + (1-alpha)*ema[i-1]`.
fn ema(series: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    ema_with_alpha(series, alpha)
}

fn ema_with_alpha(series: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(series.len());
    let mut prev = 0.0;
    for (i, &x) in series.iter().enumerate() {
        let v = if i == 0 { x } else { alpha * x + (1.0 - alpha) * prev };
        out.push(v);
        prev = v;
    }
    out
}

pub const MA_PERIODS: [u32; 4] = [5, 10, 20, 60];

/// MA(k) for each requested period, plus MA5/MA20 golden/dead cross.
pub fn calc_ma(closes: &[f64], periods: &[u32]) -> (BTreeMap<String, f64>, Vec<DetectedSignal>) {
    let mut values = BTreeMap::new();
    let mut signals = Vec::new();

    let max_period = periods.iter().copied().max().unwrap_or(0) as usize;
    if closes.len() < max_period || max_period == 0 {
        return (values, signals);
    }

    for &p in periods {
        let p = p as usize;
        if closes.len() >= p {
            let window = &closes[closes.len() - p..];
            values.insert(format!("MA{p}"), round2(mean(window)));
        }
    }

    if closes.len() >= 20 {
        let ma5_series: Vec<f64> = rolling_mean(closes, 5);
        let ma20_series: Vec<f64> = rolling_mean(closes, 20);
        let n = ma5_series.len().min(ma20_series.len());
        if n >= 2 {
            let (prev5, prev20) = (ma5_series[n - 2], ma20_series[n - 2]);
            let (curr5, curr20) = (ma5_series[n - 1], ma20_series[n - 1]);
            if prev5 <= prev20 && curr5 > curr20 {
                signals.push(DetectedSignal {
                    event: SignalEvent::GoldenCross,
                    name: "MA金叉",
                    indicator: "MA5/MA20",
                    price: Some(round2(curr20)),
                });
            } else if prev5 >= prev20 && curr5 < curr20 {
                signals.push(DetectedSignal {
                    event: SignalEvent::DeadCross,
                    name: "MA死叉",
                    indicator: "MA5/MA20",
                    price: Some(round2(curr20)),
                });
            }
        }
    }

    (values, signals)
}

/// Rolling mean aligned to the *end* of each window; index `i` of the
/// result corresponds to `series[..=i+period-1]`. Shorter than `series` by
/// `period - 1`.
fn rolling_mean(series: &[f64], period: usize) -> Vec<f64> {
    if series.len() < period {
        return Vec::new();
    }
    (period - 1..series.len())
        .map(|i| mean(&series[i + 1 - period..=i]))
        .collect()
}

pub fn calc_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> (Option<MacdValues>, Vec<DetectedSignal>) {
    if closes.len() < slow + signal {
        return (None, Vec::new());
    }

    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);
    let dif: Vec<f64> = ema_fast.iter().zip(ema_slow.iter()).map(|(f, s)| f - s).collect();
    let dea = ema(&dif, signal);
    let macd_hist: Vec<f64> = dif.iter().zip(dea.iter()).map(|(d, e)| 2.0 * (d - e)).collect();

    let values = MacdValues {
        dif: round4(*dif.last().unwrap()),
        dea: round4(*dea.last().unwrap()),
        macd: round4(*macd_hist.last().unwrap()),
    };

    let mut signals = Vec::new();
    if dif.len() >= 2 {
        let n = dif.len();
        let (prev_dif, prev_dea) = (dif[n - 2], dea[n - 2]);
        let (curr_dif, curr_dea) = (dif[n - 1], dea[n - 1]);
        if prev_dif <= prev_dea && curr_dif > curr_dea {
            signals.push(DetectedSignal {
                event: SignalEvent::GoldenCross,
                name: "MACD金叉",
                indicator: "MACD",
                price: None,
            });
        } else if prev_dif >= prev_dea && curr_dif < curr_dea {
            signals.push(DetectedSignal {
                event: SignalEvent::DeadCross,
                name: "MACD死叉",
                indicator: "MACD",
                price: None,
            });
        }
    }

    (Some(values), signals)
}

/// Classic Wilder RSI: the first average gain/loss is a simple mean over
/// the seed window, every subsequent one is recursively smoothed
/// `avg = (avg*(period-1) + x) / period` — distinct from a plain rolling
/// mean of gains/losses (see DESIGN.md for why this diverges from the
/// upstream Python, which uses the simpler rolling-mean form).
pub fn calc_rsi(closes: &[f64], period: usize) -> (Option<f64>, Vec<DetectedSignal>) {
    if closes.len() < period + 1 {
        return (None, Vec::new());
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = deltas.iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|d| (-d).max(0.0)).collect();

    let mut avg_gain = mean(&gains[..period]);
    let mut avg_loss = mean(&losses[..period]);

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
    }

    let rsi = if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    };
    let rsi = round2(rsi);

    let mut signals = Vec::new();
    if rsi < 30.0 {
        signals.push(DetectedSignal {
            event: SignalEvent::Oversold,
            name: "RSI超卖",
            indicator: "RSI",
            price: None,
        });
    } else if rsi > 70.0 {
        signals.push(DetectedSignal {
            event: SignalEvent::Overbought,
            name: "RSI超买",
            indicator: "RSI",
            price: None,
        });
    }

    (Some(rsi), signals)
}

pub fn calc_kdj(closes: &[f64], highs: &[f64], lows: &[f64], n: usize, m1: usize, m2: usize) -> (Option<KdjValues>, Vec<DetectedSignal>) {
    if closes.len() < n || highs.len() < n || lows.len() < n {
        return (None, Vec::new());
    }

    let len = closes.len();
    let mut rsv = Vec::with_capacity(len - n + 1);
    for i in n - 1..len {
        let window_high = highs[i + 1 - n..=i].iter().cloned().fold(f64::MIN, f64::max);
        let window_low = lows[i + 1 - n..=i].iter().cloned().fold(f64::MAX, f64::min);
        let range = window_high - window_low;
        let v = if range.abs() < f64::EPSILON {
            0.0
        } else {
            (closes[i] - window_low) / range * 100.0
        };
        rsv.push(v);
    }

    let k_series = ema_with_alpha(&rsv, 1.0 / m1 as f64);
    let d_series = ema_with_alpha(&k_series, 1.0 / m2 as f64);
    let j_series: Vec<f64> = k_series.iter().zip(d_series.iter()).map(|(k, d)| 3.0 * k - 2.0 * d).collect();

    let values = KdjValues {
        k: round2(*k_series.last().unwrap()),
        d: round2(*d_series.last().unwrap()),
        j: round2(*j_series.last().unwrap()),
    };

    let mut signals = Vec::new();
    if k_series.len() >= 2 {
        let n2 = k_series.len();
        let (prev_k, prev_d) = (k_series[n2 - 2], d_series[n2 - 2]);
        let (curr_k, curr_d) = (k_series[n2 - 1], d_series[n2 - 1]);
        if prev_k <= prev_d && curr_k > curr_d {
            signals.push(DetectedSignal {
                event: SignalEvent::GoldenCross,
                name: "KDJ金叉",
                indicator: "KDJ",
                price: None,
            });
        } else if prev_k >= prev_d && curr_k < curr_d {
            signals.push(DetectedSignal {
                event: SignalEvent::DeadCross,
                name: "KDJ死叉",
                indicator: "KDJ",
                price: None,
            });
        }
    }

    (Some(values), signals)
}

pub fn calc_bollinger(closes: &[f64], period: usize, std_dev: f64) -> (Option<BollingerValues>, Vec<DetectedSignal>) {
    if closes.len() < period {
        return (None, Vec::new());
    }
    let window = &closes[closes.len() - period..];
    let middle = mean(window);
    let variance = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / period as f64;
    let std = variance.sqrt();
    let upper = middle + std_dev * std;
    let lower = middle - std_dev * std;
    let current = *closes.last().unwrap();

    let values = BollingerValues {
        upper: round2(upper),
        middle: round2(middle),
        lower: round2(lower),
        width: round2(upper - lower),
    };

    let mut signals = Vec::new();
    if current < lower {
        signals.push(DetectedSignal {
            event: SignalEvent::BelowLower,
            name: "跌破布林下轨",
            indicator: "Bollinger",
            price: Some(round2(lower)),
        });
    } else if current > upper {
        signals.push(DetectedSignal {
            event: SignalEvent::AboveUpper,
            name: "突破布林上轨",
            indicator: "Bollinger",
            price: Some(round2(upper)),
        });
    }

    (Some(values), signals)
}

/// Aggregates all five indicators plus their combined signal list. Requires
/// at least 5 closes; shorter series yield an entirely empty report.
pub fn calc_all(closes: &[f64], highs: &[f64], lows: &[f64]) -> IndicatorReport {
    if closes.len() < 5 {
        return IndicatorReport::default();
    }

    let (ma, mut signals) = calc_ma(closes, &MA_PERIODS);
    let (macd, macd_signals) = calc_macd(closes, 12, 26, 9);
    let (rsi, rsi_signals) = calc_rsi(closes, 14);
    let (kdj, kdj_signals) = calc_kdj(closes, highs, lows, 9, 3, 3);
    let (bollinger, boll_signals) = calc_bollinger(closes, 20, 2.0);

    signals.extend(macd_signals);
    signals.extend(rsi_signals);
    signals.extend(kdj_signals);
    signals.extend(boll_signals);

    IndicatorReport {
        ma,
        macd,
        rsi,
        kdj,
        bollinger,
        signals,
        current_price: closes.last().copied().map(round2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ma_exactness_scenario() {
        let closes = vec![10.0, 11.0, 12.0, 13.0, 14.0];
        let (ma, _) = calc_ma(&closes, &[5]);
        assert_eq!(ma.get("MA5"), Some(&12.0));
    }

    #[test]
    fn ma_cross_idempotent() {
        let closes: Vec<f64> = (0..25).map(|i| 10.0 + (i as f64 * 0.3).sin() * 2.0 + i as f64 * 0.1).collect();
        let (_, s1) = calc_ma(&closes, &MA_PERIODS);
        let (_, s2) = calc_ma(&closes, &MA_PERIODS);
        assert_eq!(s1.len(), s2.len());
        for (a, b) in s1.iter().zip(s2.iter()) {
            assert_eq!(a.event, b.event);
        }
    }

    #[test]
    fn insufficient_data_is_empty_not_error() {
        let report = calc_all(&[1.0, 2.0], &[1.0, 2.0], &[1.0, 2.0]);
        assert!(report.ma.is_empty());
        assert!(report.signals.is_empty());
    }

    #[test]
    fn rsi_bounds_are_0_to_100() {
        let rising: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let (rsi, _) = calc_rsi(&rising, 14);
        assert_eq!(rsi, Some(100.0));
    }
}
