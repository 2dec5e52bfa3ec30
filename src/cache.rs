//! Process-local TTL caches fronting the coordinator. Bypassed whenever a
//! caller is asking for a realtime-flagged read (§4.8/§4.9) — the point of
//! these caches is to absorb repeat polling outside market hours, not to
//! serve stale prices during a session.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Bounded, TTL-expiring map. Eviction is lazy (checked on read) plus a
/// capacity-triggered LRU sweep on insert, mirroring the upstream caches'
/// "don't grow unbounded" contract without a background sweep task.
struct TtlMap<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Duration,
    capacity: usize,
}

impl<K: std::hash::Hash + Eq + Clone, V: Clone> TtlMap<K, V> {
    fn new(ttl: Duration, capacity: usize) -> Self {
        TtlMap { entries: Mutex::new(HashMap::new()), ttl, capacity }
    }

    fn get(&self, key: &K) -> Option<V> {
        let mut map = self.entries.lock();
        match map.get(key) {
            Some(e) if e.inserted_at.elapsed() < self.ttl => Some(e.value.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: K, value: V) {
        let mut map = self.entries.lock();
        if map.len() >= self.capacity && !map.contains_key(&key) {
            if let Some(oldest) = map.iter().min_by_key(|(_, e)| e.inserted_at).map(|(k, _)| k.clone()) {
                map.remove(&oldest);
            }
        }
        map.insert(key, Entry { value, inserted_at: Instant::now() });
    }

    fn clear(&self) -> usize {
        let mut map = self.entries.lock();
        let n = map.len();
        map.clear();
        n
    }

    fn remove(&self, key: &K) {
        self.entries.lock().remove(key);
    }
}

impl<V> TtlMap<String, V> {
    fn remove_prefixed(&self, prefix: &str) {
        self.entries.lock().retain(|k, _| !k.starts_with(prefix));
    }
}

const DEFAULT_CAPACITY: usize = 4096;

pub struct Caches {
    price_cache: TtlMap<String, (f64, String)>,
    kline_cache: TtlMap<String, Vec<f64>>,
    name_cache: TtlMap<String, String>,
    financial_cache: TtlMap<String, serde_json::Value>,
    valuation_cache: TtlMap<String, serde_json::Value>,
    macro_cache: TtlMap<String, serde_json::Value>,
}

impl Default for Caches {
    fn default() -> Self {
        Caches {
            price_cache: TtlMap::new(Duration::from_secs(5), DEFAULT_CAPACITY),
            kline_cache: TtlMap::new(Duration::from_secs(600), DEFAULT_CAPACITY),
            name_cache: TtlMap::new(Duration::from_secs(86_400), DEFAULT_CAPACITY),
            financial_cache: TtlMap::new(Duration::from_secs(3_600), DEFAULT_CAPACITY),
            valuation_cache: TtlMap::new(Duration::from_secs(3_600), DEFAULT_CAPACITY),
            macro_cache: TtlMap::new(Duration::from_secs(86_400), DEFAULT_CAPACITY),
        }
    }
}

impl Caches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_price(&self, symbol: &str, is_realtime: bool) -> Option<(f64, String)> {
        if is_realtime {
            return None;
        }
        self.price_cache.get(&symbol.to_string())
    }

    pub fn set_price(&self, symbol: &str, price: f64, name: &str) {
        self.price_cache.set(symbol.to_string(), (price, name.to_string()));
    }

    pub fn get_kline(&self, symbol: &str, date: &str, max_period: u32, is_realtime: bool) -> Option<Vec<f64>> {
        if is_realtime {
            return None;
        }
        self.kline_cache.get(&format!("{symbol}:{date}:{max_period}"))
    }

    pub fn set_kline(&self, symbol: &str, date: &str, max_period: u32, closes: Vec<f64>) {
        self.kline_cache.set(format!("{symbol}:{date}:{max_period}"), closes);
    }

    pub fn get_name(&self, symbol: &str) -> Option<String> {
        self.name_cache.get(&symbol.to_string())
    }

    pub fn set_name(&self, symbol: &str, name: &str) {
        self.name_cache.set(symbol.to_string(), name.to_string());
    }

    pub fn get_financial_report(&self, symbol: &str) -> Option<serde_json::Value> {
        self.financial_cache.get(&symbol.to_string())
    }

    pub fn set_financial_report(&self, symbol: &str, value: serde_json::Value) {
        self.financial_cache.set(symbol.to_string(), value);
    }

    pub fn get_valuation_metrics(&self, symbol: &str) -> Option<serde_json::Value> {
        self.valuation_cache.get(&symbol.to_string())
    }

    pub fn set_valuation_metrics(&self, symbol: &str, value: serde_json::Value) {
        self.valuation_cache.set(symbol.to_string(), value);
    }

    pub fn get_macro_indicators(&self) -> Option<serde_json::Value> {
        self.macro_cache.get(&"global".to_string())
    }

    pub fn set_macro_indicators(&self, value: serde_json::Value) {
        self.macro_cache.set("global".to_string(), value);
    }

    /// Drops every cached entry keyed off `code`, for the
    /// clear-cache-and-refresh endpoint.
    pub fn evict_symbol(&self, code: &str) {
        self.price_cache.remove(&code.to_string());
        self.kline_cache.remove_prefixed(&format!("{code}:"));
        self.name_cache.remove(&code.to_string());
    }

    /// Drains every cache and reports how many entries each held, for the
    /// operator-facing cache-clear endpoint/CLI command.
    pub fn clear_all_caches(&self) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        counts.insert("price_cache", self.price_cache.clear());
        counts.insert("kline_cache", self.kline_cache.clear());
        counts.insert("name_cache", self.name_cache.clear());
        counts.insert("financial_cache", self.financial_cache.clear());
        counts.insert("valuation_cache", self.valuation_cache.clear());
        counts.insert("macro_cache", self.macro_cache.clear());
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_reads_bypass_the_price_cache() {
        let caches = Caches::new();
        caches.set_price("600519", 1700.0, "贵州茅台");
        assert!(caches.get_price("600519", false).is_some());
        assert!(caches.get_price("600519", true).is_none());
    }

    #[test]
    fn ttl_expiry_evicts_on_read() {
        let map: TtlMap<String, i32> = TtlMap::new(Duration::from_millis(1), 10);
        map.set("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert!(map.get(&"a".to_string()).is_none());
    }

    #[test]
    fn clear_all_reports_counts_and_empties() {
        let caches = Caches::new();
        caches.set_price("600519", 1700.0, "贵州茅台");
        caches.set_name("AAPL", "Apple Inc.");
        let counts = caches.clear_all_caches();
        assert_eq!(counts["price_cache"], 1);
        assert_eq!(counts["name_cache"], 1);
        assert!(caches.get_price("600519", false).is_none());
    }

    #[test]
    fn capacity_eviction_drops_oldest_entry() {
        let map: TtlMap<String, i32> = TtlMap::new(Duration::from_secs(60), 2);
        map.set("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(2));
        map.set("b".to_string(), 2);
        std::thread::sleep(Duration::from_millis(2));
        map.set("c".to_string(), 3);
        assert!(map.get(&"a".to_string()).is_none());
        assert!(map.get(&"c".to_string()).is_some());
    }
}
