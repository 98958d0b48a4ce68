use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{Event, EventPayload, EventType};
use crate::lifecycle::Stage;

/// The persisted passport of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    /// Creation metadata, stored as the creator supplied it.
    #[serde(default)]
    pub meta: Value,
    #[serde(default = "Stage::initial")]
    pub current_stage: Stage,
    pub created_by: String,
    pub created_at: String,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl ProductRecord {
    pub fn new(id: &str, meta: Value, created_by: &str, created_at: String) -> Self {
        ProductRecord {
            id: id.to_string(),
            meta,
            current_stage: Stage::initial(),
            created_by: created_by.to_string(),
            created_at,
            events: Vec::new(),
        }
    }

    pub fn last_event(&self) -> Option<&Event> {
        self.events.last()
    }

    /// Sequence number the next appended event receives.
    pub fn next_seq(&self) -> u64 {
        self.events.len() as u64 + 1
    }

    /// Append an event and move to the stage it produces. Returns the new
    /// event's sequence number.
    pub fn append(
        &mut self,
        event_type: EventType,
        by: &str,
        at: String,
        payload: EventPayload,
    ) -> u64 {
        let seq = self.next_seq();
        self.events.push(Event {
            seq,
            event_type,
            by: by.to_string(),
            at,
            payload,
        });
        self.current_stage = event_type.target_stage();
        seq
    }

    /// Set the `meta.type` classification tag.
    ///
    /// Null metadata becomes `{"type": kind}`; non-object metadata is left as is.
    pub fn set_kind(&mut self, kind: &str) {
        if self.meta.is_null() {
            self.meta = Value::Object(serde_json::Map::new());
        }
        if let Some(meta) = self.meta.as_object_mut() {
            meta.insert("type".to_string(), Value::String(kind.to_string()));
        }
    }

    pub fn status(&self) -> StatusView {
        StatusView {
            id: self.id.clone(),
            current_stage: self.current_stage.clone(),
            last_event: self.last_event().cloned(),
        }
    }
}

/// Answer to `GetProductStatus`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub id: String,
    pub current_stage: Stage,
    pub last_event: Option<Event>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SitePayload;
    use serde_json::json;

    fn site() -> EventPayload {
        EventPayload::Site(SitePayload {
            process_hash: "p".to_string(),
            process_uri: "u".to_string(),
            site_id: None,
        })
    }

    #[test]
    fn legacy_record_without_stage_or_events_decodes() {
        let record: ProductRecord = serde_json::from_value(json!({
            "id": "P-1",
            "meta": {"color": "clear"},
            "createdBy": "Org1MSP",
            "createdAt": "2025-03-01T10:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(record.current_stage, Stage::initial());
        assert!(record.events.is_empty());
    }

    #[test]
    fn append_numbers_events_from_one() {
        let mut record = ProductRecord::new("P-1", json!({}), "Org1MSP", "t0".to_string());
        assert_eq!(record.append(EventType::Constructed, "Org3MSP", "t1".into(), site()), 1);
        assert_eq!(record.append(EventType::Demolished, "Org3MSP", "t2".into(), site()), 2);
        assert_eq!(record.current_stage, Stage::from("Demolition"));
        assert_eq!(record.last_event().map(|e| e.seq), Some(2));
    }

    #[test]
    fn set_kind_on_object_null_and_scalar_meta() {
        let mut obj = ProductRecord::new("P-1", json!({"a": 1}), "Org1MSP", "t".into());
        obj.set_kind("window");
        assert_eq!(obj.meta, json!({"a": 1, "type": "window"}));

        let mut null = ProductRecord::new("P-2", Value::Null, "Org1MSP", "t".into());
        null.set_kind("flat-glass");
        assert_eq!(null.meta, json!({"type": "flat-glass"}));

        let mut scalar = ProductRecord::new("P-3", json!("pane"), "Org1MSP", "t".into());
        scalar.set_kind("window");
        assert_eq!(scalar.meta, json!("pane"));
    }

    #[test]
    fn status_of_new_product_has_null_last_event() {
        let record = ProductRecord::new("P-1", json!({}), "Org1MSP", "t".into());
        assert_eq!(
            serde_json::to_value(record.status()).unwrap(),
            json!({"id": "P-1", "currentStage": "NEW", "lastEvent": null})
        );
    }
}
