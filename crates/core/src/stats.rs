// crates/core/src/stats.rs
//! Rolling usage counters and the snapshot records that overwrite them.
//!
//! The backend periodically emits an authoritative `stats` record. Between
//! snapshots, the session bumps `tools_used` and `vulnerabilities_found`
//! optimistically; the next snapshot overwrites whatever fields it carries and
//! leaves the rest alone.

use serde::Serialize;
use serde_json::{Map, Value};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Fixed-point cost
// ---------------------------------------------------------------------------

/// US dollars in millionths. Costs arrive as floats and are summed and
/// compared as integers from then on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MicroUsd(pub u64);

impl MicroUsd {
    pub const ZERO: MicroUsd = MicroUsd(0);

    /// Round to the nearest micro-dollar. Negative and non-finite inputs are 0.
    pub fn from_usd(usd: f64) -> Self {
        if !usd.is_finite() || usd <= 0.0 {
            return MicroUsd(0);
        }
        MicroUsd((usd * 1_000_000.0).round() as u64)
    }

    pub fn as_usd(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl std::fmt::Display for MicroUsd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.4}", self.as_usd())
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[ts(type = "number")]
    pub tools_used: u64,
    #[ts(type = "number")]
    pub vulnerabilities_found: u64,
    #[ts(type = "number")]
    pub agents_count: u64,
    #[ts(type = "number")]
    pub input_tokens: u64,
    #[ts(type = "number")]
    pub output_tokens: u64,
    /// Micro-dollars.
    #[ts(type = "number")]
    pub cost_estimate: MicroUsd,
    #[ts(type = "number")]
    pub elapsed_seconds: u64,
}

/// Fields carried by one `stats` record. `None` means the record did not
/// carry that field and the previous value stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub tools_count: Option<u64>,
    pub vulnerabilities_count: Option<u64>,
    pub agents_count: Option<u64>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cost: Option<MicroUsd>,
    pub elapsed_seconds: Option<u64>,
}

impl StatsSnapshot {
    /// Read a snapshot from a decoded `stats` payload.
    ///
    /// Token and cost figures may sit at the top level or under `total`; the
    /// top-level value wins when both are present.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let total = map.get("total").and_then(Value::as_object);
        let flat_or_total = |key: &str| {
            count(map.get(key)).or_else(|| total.and_then(|t| count(t.get(key))))
        };
        let cost = amount(map.get("cost"))
            .or_else(|| total.and_then(|t| amount(t.get("cost"))))
            .map(MicroUsd::from_usd);

        StatsSnapshot {
            tools_count: first_count(map, &["tools_count", "tools_used"]),
            vulnerabilities_count: first_count(map, &["vulnerabilities_count", "vulns_count"]),
            agents_count: count(map.get("agents_count")),
            input_tokens: flat_or_total("input_tokens"),
            output_tokens: flat_or_total("output_tokens"),
            cost,
            elapsed_seconds: first_count(map, &["elapsed_seconds", "runtime"]),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == StatsSnapshot::default()
    }
}

/// Field-wise overwrite of `previous` with every field `snapshot` carries.
pub fn apply(previous: &Stats, snapshot: &StatsSnapshot) -> Stats {
    Stats {
        tools_used: snapshot.tools_count.unwrap_or(previous.tools_used),
        vulnerabilities_found: snapshot
            .vulnerabilities_count
            .unwrap_or(previous.vulnerabilities_found),
        agents_count: snapshot.agents_count.unwrap_or(previous.agents_count),
        input_tokens: snapshot.input_tokens.unwrap_or(previous.input_tokens),
        output_tokens: snapshot.output_tokens.unwrap_or(previous.output_tokens),
        cost_estimate: snapshot.cost.unwrap_or(previous.cost_estimate),
        elapsed_seconds: snapshot.elapsed_seconds.unwrap_or(previous.elapsed_seconds),
    }
}

// ---------------------------------------------------------------------------
// Numeric field parsing
// ---------------------------------------------------------------------------

/// A non-negative number, or a string holding one.
fn amount(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n >= 0.0).then_some(n)
}

fn count(value: Option<&Value>) -> Option<u64> {
    if let Some(n) = value.and_then(Value::as_u64) {
        return Some(n);
    }
    amount(value).map(|n| n.round() as u64)
}

fn first_count(map: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| count(map.get(*k)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn snapshot(value: Value) -> StatsSnapshot {
        StatsSnapshot::from_map(value.as_object().unwrap())
    }

    #[test]
    fn test_micro_usd_rounding() {
        assert_eq!(MicroUsd::from_usd(0.02), MicroUsd(20_000));
        assert_eq!(MicroUsd::from_usd(1.2345678), MicroUsd(1_234_568));
        assert_eq!(MicroUsd::from_usd(-3.0), MicroUsd::ZERO);
        assert_eq!(MicroUsd::from_usd(f64::NAN), MicroUsd::ZERO);
        assert_eq!(MicroUsd(20_000).to_string(), "$0.0200");
    }

    #[test]
    fn test_upstream_total_shape() {
        let snap = snapshot(json!({
            "total": {"input_tokens": 1200, "output_tokens": 340, "cost": 0.05},
            "agents_count": 3,
            "tools_count": 17,
        }));
        assert_eq!(
            snap,
            StatsSnapshot {
                tools_count: Some(17),
                vulnerabilities_count: None,
                agents_count: Some(3),
                input_tokens: Some(1200),
                output_tokens: Some(340),
                cost: Some(MicroUsd(50_000)),
                elapsed_seconds: None,
            }
        );
    }

    #[test]
    fn test_flat_value_wins_over_total() {
        let snap = snapshot(json!({"input_tokens": 10, "total": {"input_tokens": 99, "output_tokens": 5}}));
        assert_eq!(snap.input_tokens, Some(10));
        assert_eq!(snap.output_tokens, Some(5));
    }

    #[test]
    fn test_null_and_garbage_fields_are_absent() {
        let snap = snapshot(json!({"agents_count": null, "cost": "n/a", "tools_count": -4, "runtime": "42"}));
        assert_eq!(snap.agents_count, None);
        assert_eq!(snap.cost, None);
        assert_eq!(snap.tools_count, None);
        assert_eq!(snap.elapsed_seconds, Some(42));
    }

    #[test]
    fn test_empty_snapshot() {
        assert!(snapshot(json!({})).is_empty());
    }

    #[test]
    fn test_apply_overwrites_only_present_fields() {
        let previous = Stats {
            tools_used: 4,
            vulnerabilities_found: 1,
            agents_count: 2,
            input_tokens: 100,
            output_tokens: 50,
            cost_estimate: MicroUsd(10),
            elapsed_seconds: 30,
        };
        let next = apply(
            &previous,
            &StatsSnapshot {
                tools_count: Some(3),
                cost: Some(MicroUsd(20_000)),
                ..Default::default()
            },
        );
        assert_eq!(
            next,
            Stats {
                tools_used: 3,
                cost_estimate: MicroUsd(20_000),
                ..previous
            }
        );
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let json = serde_json::to_value(Stats::default()).unwrap();
        assert!(json.get("toolsUsed").is_some());
        assert!(json.get("costEstimate").is_some());
    }
}
