//! Declarative compliance rules over a product's event log.
//!
//! A rule names an event type and the fields that event must carry. Fields
//! are dotted paths into the event's JSON form (`payload.rawMatHash`, `by`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PassportError;
use crate::event::EventType;
use crate::lifecycle::Stage;
use crate::record::ProductRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub when: EventType,
    #[serde(default)]
    pub require: Vec<String>,
}

impl Rule {
    pub fn new(id: &str, when: EventType, require: &[&str]) -> Self {
        Rule {
            id: id.to_string(),
            when,
            require: require.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub id: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub product_id: String,
    pub current_stage: Stage,
    /// True when every check passed; true for an empty rule set.
    pub ok: bool,
    pub checks: Vec<CheckResult>,
}

/// Evaluate `rules` against a record. Pure.
///
/// Each rule looks only at the first event of its type.
pub fn evaluate(record: &ProductRecord, rules: &[Rule]) -> Result<ComplianceReport, PassportError> {
    let mut checks = Vec::with_capacity(rules.len());
    for rule in rules {
        let reason = match record.events.iter().find(|e| e.event_type == rule.when) {
            None => Some(format!("no {} event", rule.when)),
            Some(event) => {
                let json = serde_json::to_value(event).map_err(|e| PassportError::Corrupt {
                    key: record.id.clone(),
                    reason: format!("event #{}: {e}", event.seq),
                })?;
                rule.require
                    .iter()
                    .find(|path| !is_present(&json, path))
                    .map(|path| format!("missing field {path}"))
            }
        };
        checks.push(CheckResult {
            id: rule.id.clone(),
            passed: reason.is_none(),
            reason,
        });
    }

    Ok(ComplianceReport {
        product_id: record.id.clone(),
        current_stage: record.current_stage.clone(),
        ok: checks.iter().all(|c| c.passed),
        checks,
    })
}

/// Null counts as missing.
fn is_present(json: &Value, path: &str) -> bool {
    path.split('.')
        .try_fold(json, |node, segment| node.get(segment))
        .is_some_and(|v| !v.is_null())
}

/// One rule per mainline stage, requiring its document hash and URI.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "raw-material-provenance",
            EventType::RawMaterialSupplied,
            &["payload.rawMatHash", "payload.rawMatUri"],
        ),
        Rule::new(
            "manufacturing-process",
            EventType::GlassManufactured,
            &["payload.processHash", "payload.processUri"],
        ),
        Rule::new(
            "assembly-record",
            EventType::Assembled,
            &["payload.assemblyHash", "payload.assemblyUri"],
        ),
        Rule::new(
            "construction-record",
            EventType::Constructed,
            &["payload.processHash", "payload.processUri"],
        ),
        Rule::new(
            "demolition-record",
            EventType::Demolished,
            &["payload.processHash", "payload.processUri"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventPayload, ManufacturePayload, RawMaterialPayload};
    use serde_json::json;

    fn record_with_raw_and_glass() -> ProductRecord {
        let mut record = ProductRecord::new("P-1", json!({}), "Org1MSP", "t0".into());
        record.append(
            EventType::RawMaterialSupplied,
            "Org1MSP",
            "t1".into(),
            EventPayload::RawMaterial(RawMaterialPayload {
                raw_mat_hash: "h".into(),
                raw_mat_uri: "u".into(),
                batch_no: "b".into(),
            }),
        );
        record.append(
            EventType::GlassManufactured,
            "Org2MSP",
            "t2".into(),
            EventPayload::Manufacture(ManufacturePayload {
                process_hash: "p".into(),
                process_uri: "pu".into(),
                batch_no: None,
                furnace_id: None,
                cullet_ratio: None,
                inputs: vec![],
            }),
        );
        record
    }

    #[test]
    fn empty_rule_set_is_ok() {
        let report = evaluate(&record_with_raw_and_glass(), &[]).unwrap();
        assert!(report.ok);
        assert!(report.checks.is_empty());
    }

    #[test]
    fn missing_event_fails_rule() {
        let report = evaluate(&record_with_raw_and_glass(), &default_rules()).unwrap();
        assert!(!report.ok);
        let assembly = report
            .checks
            .iter()
            .find(|c| c.id == "assembly-record")
            .unwrap();
        assert_eq!(assembly.reason.as_deref(), Some("no Assembled event"));
        assert!(report.checks[0].passed);
        assert!(report.checks[1].passed);
    }

    #[test]
    fn first_missing_field_is_reported() {
        let rules = [Rule::new(
            "furnace",
            EventType::GlassManufactured,
            &["by", "payload.furnaceId", "payload.batchNo"],
        )];
        let report = evaluate(&record_with_raw_and_glass(), &rules).unwrap();
        assert_eq!(
            report.checks[0].reason.as_deref(),
            Some("missing field payload.furnaceId")
        );
    }

    #[test]
    fn null_counts_as_missing() {
        let json = json!({"payload": {"sku": null, "n": 0}});
        assert!(!is_present(&json, "payload.sku"));
        assert!(is_present(&json, "payload.n"));
        assert!(!is_present(&json, "payload.n.deeper"));
    }

    #[test]
    fn rules_parse_from_json() {
        let rules: Vec<Rule> = serde_json::from_str(
            r#"[{"id": "r", "when": "Assembled", "require": ["payload.sku"]}]"#,
        )
        .unwrap();
        assert_eq!(rules[0].when, EventType::Assembled);
        assert!(serde_json::from_str::<Vec<Rule>>(r#"[{"id": "r", "when": "Painted"}]"#).is_err());
    }
}
