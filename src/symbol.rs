//! Maps a user-entered symbol to a canonical `(code, market)` pair.
//!
//! Rules apply in order; the more specific numeric-prefix rule wins over a
//! shorter one (`92` is checked before `9`).

use crate::config::Market;

/// Canonicalized identity of an instrument as seen by the rest of the
/// pipeline: the coordinator, caches, and calendar all key off this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSymbol {
    pub code: String,
    pub market: Market,
}

pub fn normalize(symbol: &str) -> NormalizedSymbol {
    let symbol = symbol.trim();

    if let Some((prefix, suffix)) = symbol.rsplit_once('.') {
        return match suffix.to_ascii_uppercase().as_str() {
            "SS" | "SH" => NormalizedSymbol {
                code: format!("sh{prefix}"),
                market: Market::Cn,
            },
            "SZ" => NormalizedSymbol {
                code: format!("sz{prefix}"),
                market: Market::Cn,
            },
            "BJ" => NormalizedSymbol {
                code: format!("bj{prefix}"),
                market: Market::Cn,
            },
            _ => NormalizedSymbol {
                code: symbol.to_ascii_uppercase(),
                market: Market::Us,
            },
        };
    }

    let is_digits_only = !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_digit());

    if is_digits_only && symbol.len() == 6 {
        if symbol.starts_with("92") {
            return NormalizedSymbol {
                code: format!("bj{symbol}"),
                market: Market::Cn,
            };
        }
        if symbol.starts_with('4') || symbol.starts_with('8') {
            return NormalizedSymbol {
                code: format!("bj{symbol}"),
                market: Market::Cn,
            };
        }
        if symbol.starts_with('6') || symbol.starts_with('9') {
            return NormalizedSymbol {
                code: format!("sh{symbol}"),
                market: Market::Cn,
            };
        }
        if symbol.starts_with('0') || symbol.starts_with('3') {
            return NormalizedSymbol {
                code: format!("sz{symbol}"),
                market: Market::Cn,
            };
        }
    }

    NormalizedSymbol {
        code: symbol.to_ascii_uppercase(),
        market: Market::Us,
    }
}

/// A small, fixed pool of externally-hosted chart image URLs for a symbol.
/// Pull-based lookup; carried over from the original crud surface because
/// no Non-goal excludes it.
pub fn chart_urls(code: &str, market: Market) -> Vec<String> {
    match market {
        Market::Cn => vec![
            format!("https://image.sinajs.cn/newchart/daily/n/{code}.gif"),
            format!("https://image.sinajs.cn/newchart/weekly/n/{code}.gif"),
        ],
        Market::Us => vec![format!(
            "https://stockcharts.com/c-sc/sc?s={code}&p=D&yr=0&mn=6"
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_us_ticker() {
        let n = normalize("AAPL");
        assert_eq!(n.market, Market::Us);
        assert_eq!(n.code, "AAPL");
    }

    #[test]
    fn dot_suffix_shanghai() {
        let n = normalize("600000.SS");
        assert_eq!(n.market, Market::Cn);
        assert_eq!(n.code, "sh600000");
    }

    #[test]
    fn dot_suffix_shenzhen() {
        let n = normalize("000001.SZ");
        assert_eq!(n.market, Market::Cn);
        assert_eq!(n.code, "sz000001");
    }

    #[test]
    fn dot_suffix_beijing() {
        let n = normalize("830799.BJ");
        assert_eq!(n.market, Market::Cn);
        assert_eq!(n.code, "bj830799");
    }

    #[test]
    fn dot_suffix_unknown_is_us() {
        let n = normalize("BRK.B");
        assert_eq!(n.market, Market::Us);
        assert_eq!(n.code, "BRK.B");
    }

    #[test]
    fn six_digit_bse_prefix_92_before_9() {
        let n = normalize("920001");
        assert_eq!(n.market, Market::Cn);
        assert_eq!(n.code, "bj920001");
    }

    #[test]
    fn six_digit_shanghai() {
        let n = normalize("600519");
        assert_eq!(n.market, Market::Cn);
        assert_eq!(n.code, "sh600519");
    }

    #[test]
    fn six_digit_shenzhen() {
        let n = normalize("000858");
        assert_eq!(n.market, Market::Cn);
        assert_eq!(n.code, "sz000858");
    }

    #[test]
    fn six_digit_bse_prefix_4_and_8() {
        assert_eq!(normalize("430047").code, "bj430047");
        assert_eq!(normalize("835368").code, "bj835368");
    }

    #[test]
    fn non_six_digit_numeric_falls_through_to_us() {
        let n = normalize("12345");
        assert_eq!(n.market, Market::Us);
    }
}
