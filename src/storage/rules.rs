//! Trading-rule persistence. Conditions and price config are stored as
//! serialized JSON columns and round-tripped through serde, matching the
//! layout of `signals.indicators`/`triggers`.

use super::Db;
use crate::rules::{defaults, RuleKind, TradingRule};
use rusqlite::params;

fn rule_kind_str(kind: RuleKind) -> &'static str {
    match kind {
        RuleKind::Buy => "buy",
        RuleKind::Sell => "sell",
    }
}

fn parse_rule_kind(s: &str) -> RuleKind {
    match s {
        "sell" => RuleKind::Sell,
        _ => RuleKind::Buy,
    }
}

fn row_to_rule(row: &rusqlite::Row) -> rusqlite::Result<TradingRule> {
    let kind_str: String = row.get(2)?;
    let conditions_json: String = row.get(6)?;
    let price_json: String = row.get(7)?;
    Ok(TradingRule {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: parse_rule_kind(&kind_str),
        enabled: row.get::<_, i64>(3)? != 0,
        priority: row.get(4)?,
        strength: row.get::<_, i64>(5)? as u8,
        conditions: serde_json::from_str(&conditions_json).unwrap_or_default(),
        price_config: serde_json::from_str(&price_json).unwrap_or_else(|_| {
            crate::rules::price::PriceSpec::default_percentage_entry(0.0)
        }),
        description_template: row.get(8)?,
    })
}

impl Db {
    pub fn insert_rule(&self, rule: &TradingRule) -> anyhow::Result<i64> {
        let conditions_json = serde_json::to_string(&rule.conditions)?;
        let price_json = serde_json::to_string(&rule.price_config)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO trading_rules (name, rule_type, enabled, priority, strength, conditions, price_config, description_template)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    rule.name,
                    rule_kind_str(rule.kind),
                    rule.enabled as i64,
                    rule.priority,
                    rule.strength as i64,
                    conditions_json,
                    price_json,
                    rule.description_template,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .map_err(anyhow::Error::from)
    }

    pub fn list_rules(&self) -> rusqlite::Result<Vec<TradingRule>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, rule_type, enabled, priority, strength, conditions, price_config, description_template
                 FROM trading_rules ORDER BY priority DESC, id ASC",
            )?;
            stmt.query_map([], row_to_rule)?.collect()
        })
    }

    pub fn rule_count(&self) -> rusqlite::Result<i64> {
        self.with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM trading_rules", [], |r| r.get(0)))
    }

    pub fn set_rule_enabled(&self, id: i64, enabled: bool) -> rusqlite::Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE trading_rules SET enabled = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![enabled as i64, id],
            )? > 0)
        })
    }

    /// Populates the built-in 8-rule set if the table is empty. Idempotent:
    /// safe to call on every startup.
    pub fn seed_default_rules_if_empty(&self) -> anyhow::Result<()> {
        if self.rule_count()? > 0 {
            return Ok(());
        }
        for rule in defaults::default_rules() {
            self.insert_rule(&rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_is_idempotent_and_yields_eight() {
        let db = Db::open_in_memory().unwrap();
        db.seed_default_rules_if_empty().unwrap();
        db.seed_default_rules_if_empty().unwrap();
        assert_eq!(db.rule_count().unwrap(), 8);
        let rules = db.list_rules().unwrap();
        assert_eq!(rules.len(), 8);
    }
}
