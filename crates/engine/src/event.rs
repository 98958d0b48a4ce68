//! Typed lifecycle events.
//!
//! Events are stored as `{seq, type, by, at, payload}` JSON. The payload's
//! shape is fixed by the event type and is decoded into a typed variant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::error::PassportError;
use crate::lifecycle::{self, Stage};

/// Render a consensus timestamp as ISO-8601 UTC with millisecond precision.
pub fn iso_timestamp(at: OffsetDateTime) -> Result<String, PassportError> {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    at.to_offset(UtcOffset::UTC)
        .format(format)
        .map_err(|e| PassportError::Storage(format!("cannot format timestamp: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventType {
    RawMaterialSupplied,
    GlassManufactured,
    Assembled,
    Constructed,
    Demolished,
    Recycled,
    Landfilled,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        EventType::RawMaterialSupplied,
        EventType::GlassManufactured,
        EventType::Assembled,
        EventType::Constructed,
        EventType::Demolished,
        EventType::Recycled,
        EventType::Landfilled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RawMaterialSupplied => "RawMaterialSupplied",
            EventType::GlassManufactured => "GlassManufactured",
            EventType::Assembled => "Assembled",
            EventType::Constructed => "Constructed",
            EventType::Demolished => "Demolished",
            EventType::Recycled => "Recycled",
            EventType::Landfilled => "Landfilled",
        }
    }

    /// The stage a product is in right after an event of this type.
    pub fn target_stage(&self) -> Stage {
        Stage::from(match self {
            EventType::RawMaterialSupplied => lifecycle::RAW_SUPPLIED,
            EventType::GlassManufactured => lifecycle::GLASS_MANUFACTURED,
            EventType::Assembled => lifecycle::ASSEMBLING,
            EventType::Constructed => lifecycle::CONSTRUCTION,
            EventType::Demolished => lifecycle::DEMOLITION,
            EventType::Recycled => lifecycle::RECYCLING,
            EventType::Landfilled => lifecycle::LAND_FILL,
        })
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = PassportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PassportError::InvalidArgument(format!("unknown event type '{s}'")))
    }
}

// ── Payloads ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMaterialPayload {
    pub raw_mat_hash: String,
    pub raw_mat_uri: String,
    pub batch_no: String,
}

/// A reference from a manufacturing event to a raw-material event of the
/// same product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputRef {
    /// Matches `payload.rawMatHash`.
    Hash { hash: String },
    /// Matches the event sequence number.
    Seq {
        #[serde(deserialize_with = "integral_seq")]
        seq: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManufacturePayload {
    pub process_hash: String,
    pub process_uri: String,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub batch_no: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub furnace_id: Option<String>,
    /// Older records carry this as a string, `""` when absent.
    #[serde(default, deserialize_with = "lenient_ratio", skip_serializing_if = "Option::is_none")]
    pub cullet_ratio: Option<f64>,
    #[serde(default)]
    pub inputs: Vec<InputRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyPayload {
    pub assembly_hash: String,
    pub assembly_uri: String,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

/// Payload shared by the on-site stages: construction, demolition,
/// recycling and landfill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitePayload {
    pub process_hash: String,
    pub process_uri: String,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
}

// ── Lenient field decoding ───────────────────────────────────────────────────
//
// Chaincode arguments arrive as strings, and earlier deployments persisted
// them unconverted. These accept both forms.

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Unsigned(u64),
    Float(f64),
    Text(String),
}

/// `""` and null both mean absent.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

fn lenient_ratio<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let ratio = match Option::<NumberOrText>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(NumberOrText::Unsigned(n)) => n as f64,
        Some(NumberOrText::Float(f)) => f,
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(NumberOrText::Text(s)) => s.trim().parse::<f64>().map_err(|_| {
            serde::de::Error::custom(format!("culletRatio '{s}' is not a number"))
        })?,
    };
    if ratio.is_finite() {
        Ok(Some(ratio))
    } else {
        Err(serde::de::Error::custom("culletRatio must be finite"))
    }
}

/// Whole numbers written as floats (`1.0`) are accepted.
fn integral_seq<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Unsigned(n) => Ok(n),
        NumberOrText::Float(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
            Ok(f as u64)
        }
        _ => Err(serde::de::Error::custom("seq must be a non-negative integer")),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    RawMaterial(RawMaterialPayload),
    Manufacture(ManufacturePayload),
    Assembly(AssemblyPayload),
    Site(SitePayload),
}

impl EventPayload {
    fn decode(event_type: EventType, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match event_type {
            EventType::RawMaterialSupplied => {
                EventPayload::RawMaterial(serde_json::from_value(value)?)
            }
            EventType::GlassManufactured => EventPayload::Manufacture(serde_json::from_value(value)?),
            EventType::Assembled => EventPayload::Assembly(serde_json::from_value(value)?),
            EventType::Constructed
            | EventType::Demolished
            | EventType::Recycled
            | EventType::Landfilled => EventPayload::Site(serde_json::from_value(value)?),
        })
    }
}

// ── Event ────────────────────────────────────────────────────────────────────

/// One immutable entry in a product's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredEvent")]
pub struct Event {
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// MSP id of the acting organization.
    pub by: String,
    /// Consensus timestamp, ISO-8601 UTC.
    pub at: String,
    pub payload: EventPayload,
}

#[derive(Deserialize)]
struct StoredEvent {
    seq: u64,
    #[serde(rename = "type")]
    event_type: EventType,
    by: String,
    at: String,
    #[serde(default)]
    payload: serde_json::Value,
}

impl TryFrom<StoredEvent> for Event {
    type Error = String;

    fn try_from(raw: StoredEvent) -> Result<Self, Self::Error> {
        let payload = EventPayload::decode(raw.event_type, raw.payload)
            .map_err(|e| format!("{} payload of event #{}: {e}", raw.event_type, raw.seq))?;
        Ok(Event {
            seq: raw.seq,
            event_type: raw.event_type,
            by: raw.by,
            at: raw.at,
            payload,
        })
    }
}

impl Event {
    /// Raw-material hash, when this is a raw-material event.
    pub fn raw_material_hash(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::RawMaterial(p) => Some(&p.raw_mat_hash),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn timestamp_has_millis_and_z() {
        let at = datetime!(2025-03-01 12:34:56.789 +02:00);
        assert_eq!(iso_timestamp(at).unwrap(), "2025-03-01T10:34:56.789Z");
    }

    #[test]
    fn event_json_shape() {
        let event = Event {
            seq: 1,
            event_type: EventType::RawMaterialSupplied,
            by: "Org1MSP".to_string(),
            at: "2025-03-01T10:00:00.000Z".to_string(),
            payload: EventPayload::RawMaterial(RawMaterialPayload {
                raw_mat_hash: "h1".to_string(),
                raw_mat_uri: "ipfs://h1".to_string(),
                batch_no: "B-7".to_string(),
            }),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "seq": 1,
                "type": "RawMaterialSupplied",
                "by": "Org1MSP",
                "at": "2025-03-01T10:00:00.000Z",
                "payload": {"rawMatHash": "h1", "rawMatUri": "ipfs://h1", "batchNo": "B-7"}
            })
        );
    }

    #[test]
    fn payload_decoded_by_event_type() {
        let value = json!({
            "seq": 2,
            "type": "Demolished",
            "by": "Org3MSP",
            "at": "2025-03-01T10:00:00.000Z",
            "payload": {"processHash": "p", "processUri": "u"}
        });
        let event: Event = serde_json::from_value(value).unwrap();
        assert_eq!(
            event.payload,
            EventPayload::Site(SitePayload {
                process_hash: "p".to_string(),
                process_uri: "u".to_string(),
                site_id: None,
            })
        );
    }

    #[test]
    fn mismatched_payload_is_rejected() {
        let value = json!({
            "seq": 1,
            "type": "RawMaterialSupplied",
            "by": "Org1MSP",
            "at": "2025-03-01T10:00:00.000Z",
            "payload": {"processHash": "p", "processUri": "u"}
        });
        assert!(serde_json::from_value::<Event>(value).is_err());
    }

    #[test]
    fn legacy_manufacture_payload_decodes() {
        let value = json!({
            "seq": 2,
            "type": "GlassManufactured",
            "by": "Org2MSP",
            "at": "2025-03-01T10:00:00.000Z",
            "payload": {
                "processHash": "p",
                "processUri": "u",
                "batchNo": "",
                "furnaceId": "",
                "culletRatio": "0.3",
                "inputs": []
            }
        });
        let event: Event = serde_json::from_value(value).unwrap();
        assert_eq!(
            event.payload,
            EventPayload::Manufacture(ManufacturePayload {
                process_hash: "p".to_string(),
                process_uri: "u".to_string(),
                batch_no: None,
                furnace_id: None,
                cullet_ratio: Some(0.3),
                inputs: vec![],
            })
        );
    }

    #[test]
    fn cullet_ratio_forms() {
        let decode = |ratio: serde_json::Value| {
            serde_json::from_value::<ManufacturePayload>(
                json!({"processHash": "p", "processUri": "u", "culletRatio": ratio}),
            )
            .map(|p| p.cullet_ratio)
        };
        assert_eq!(decode(json!(0.25)).unwrap(), Some(0.25));
        assert_eq!(decode(json!(1)).unwrap(), Some(1.0));
        assert_eq!(decode(json!(" 0.5 ")).unwrap(), Some(0.5));
        assert_eq!(decode(json!("")).unwrap(), None);
        assert_eq!(decode(json!(null)).unwrap(), None);
        assert!(decode(json!("lots")).is_err());
        assert!(decode(json!("NaN")).is_err());
    }

    #[test]
    fn seq_reference_accepts_whole_floats() {
        let refs: Vec<InputRef> = serde_json::from_str(r#"[{"seq":1.0},{"seq":3}]"#).unwrap();
        assert_eq!(refs, vec![InputRef::Seq { seq: 1 }, InputRef::Seq { seq: 3 }]);

        for bad in [r#"[{"seq":1.5}]"#, r#"[{"seq":-1}]"#, r#"[{"seq":"1"}]"#] {
            assert!(serde_json::from_str::<Vec<InputRef>>(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn optional_fields_are_omitted() {
        let payload = EventPayload::Manufacture(ManufacturePayload {
            process_hash: "p".to_string(),
            process_uri: "u".to_string(),
            batch_no: None,
            furnace_id: Some("F-2".to_string()),
            cullet_ratio: None,
            inputs: vec![InputRef::Seq { seq: 1 }],
        });
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"processHash": "p", "processUri": "u", "furnaceId": "F-2", "inputs": [{"seq": 1}]})
        );
    }

    #[test]
    fn every_event_type_targets_a_default_stage() {
        let graph = crate::lifecycle::StageGraph::default();
        let stages = graph.stages();
        for t in EventType::ALL {
            assert!(stages.contains(&t.target_stage()), "{t}");
        }
    }
}
