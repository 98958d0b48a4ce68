//! Lifecycle transition handlers.
//!
//! Every mutating lifecycle action runs the same pipeline:
//!
//! 1. Authorization (fails closed)
//! 2. Argument validation, naming every missing field at once
//! 3. Record fetch
//! 4. Lifecycle check against the persisted stage
//! 5. Handler-specific checks and effects
//! 6. Event append and stage update
//! 7. Persist and notify
//!
//! Handlers only describe what differs between actions: the event type they
//! produce, how their payload is read from positional arguments, and any
//! extra effect on the record.

use dpp_storage::LedgerStorage;
use serde::Serialize;
use tracing::{info, warn};

use crate::access::{AccessPolicy, Caller};
use crate::action::Action;
use crate::error::PassportError;
use crate::event::{
    iso_timestamp, AssemblyPayload, EventPayload, EventType, InputRef, ManufacturePayload,
    RawMaterialPayload, SitePayload,
};
use crate::lifecycle::{Stage, StageGraph};
use crate::record::ProductRecord;
use crate::store::ProductStore;

/// Topic every passport notification is published on.
pub const DPP_EVENT_TOPIC: &str = "DPP_EVENT";

/// Body of a `DPP_EVENT` notification. `seq` is 0 for product creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub product_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub seq: u64,
}

/// Answer to a successful lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub ok: bool,
    pub product_id: String,
    pub current_stage: Stage,
}

// ── Arguments ────────────────────────────────────────────────────────────────

/// Reads positional string arguments, collecting every missing required one.
pub struct ArgReader<'a> {
    args: &'a [String],
    pos: usize,
    missing: Vec<&'static str>,
}

impl<'a> ArgReader<'a> {
    pub fn new(args: &'a [String]) -> Self {
        ArgReader {
            args,
            pos: 0,
            missing: Vec::new(),
        }
    }

    fn next_arg(&mut self) -> Option<&'a str> {
        let arg = self.args.get(self.pos).map(String::as_str);
        self.pos += 1;
        arg.filter(|s| !s.trim().is_empty())
    }

    /// A required argument. Missing or blank values are recorded and read as
    /// the empty string; [`finish`](Self::finish) reports them.
    pub fn required(&mut self, name: &'static str) -> String {
        match self.next_arg() {
            Some(value) => value.to_string(),
            None => {
                self.missing.push(name);
                String::new()
            }
        }
    }

    /// An optional argument. Blank values count as absent.
    pub fn optional(&mut self) -> Option<String> {
        self.next_arg().map(str::to_string)
    }

    pub fn finish(self) -> Result<(), PassportError> {
        if self.missing.is_empty() {
            return Ok(());
        }
        Err(PassportError::InvalidArgument(format!(
            "missing required argument(s): {}",
            self.missing.join(", ")
        )))
    }
}

// ── Handler interface ────────────────────────────────────────────────────────

/// One lifecycle action.
pub trait Transition: Send + Sync {
    fn action(&self) -> Action;

    fn event_type(&self) -> EventType;

    /// Read the payload from the positional arguments after `productId`.
    ///
    /// Required fields go through [`ArgReader::required`]; the pipeline
    /// reports them all together. Other malformed input fails here.
    fn validate(&self, args: &mut ArgReader<'_>) -> Result<EventPayload, PassportError>;

    /// Checks and effects beyond the event append, run after the lifecycle
    /// check and before the event is added.
    fn apply(&self, _record: &mut ProductRecord, _payload: &EventPayload) -> Result<(), PassportError> {
        Ok(())
    }
}

pub struct RegisterRawMaterial;

impl Transition for RegisterRawMaterial {
    fn action(&self) -> Action {
        Action::RegisterRawMaterial
    }

    fn event_type(&self) -> EventType {
        EventType::RawMaterialSupplied
    }

    fn validate(&self, args: &mut ArgReader<'_>) -> Result<EventPayload, PassportError> {
        Ok(EventPayload::RawMaterial(RawMaterialPayload {
            raw_mat_hash: args.required("hash"),
            raw_mat_uri: args.required("uri"),
            batch_no: args.required("batchNo"),
        }))
    }
}

pub struct ManufactureGlass;

impl Transition for ManufactureGlass {
    fn action(&self) -> Action {
        Action::ManufactureGlass
    }

    fn event_type(&self) -> EventType {
        EventType::GlassManufactured
    }

    fn validate(&self, args: &mut ArgReader<'_>) -> Result<EventPayload, PassportError> {
        let process_hash = args.required("hash");
        let process_uri = args.required("uri");
        let batch_no = args.optional();
        let furnace_id = args.optional();
        let cullet_ratio = args.optional().map(|s| parse_ratio(&s)).transpose()?;
        let inputs = match args.optional() {
            Some(json) => parse_inputs(&json)?,
            None => Vec::new(),
        };
        Ok(EventPayload::Manufacture(ManufacturePayload {
            process_hash,
            process_uri,
            batch_no,
            furnace_id,
            cullet_ratio,
            inputs,
        }))
    }

    fn apply(&self, record: &mut ProductRecord, payload: &EventPayload) -> Result<(), PassportError> {
        match payload {
            EventPayload::Manufacture(p) => check_inputs(record, &p.inputs)?,
            other => {
                return Err(PassportError::InvalidArgument(format!(
                    "ManufactureGlass expects a manufacture payload, got {other:?}"
                )))
            }
        }
        record.set_kind("flat-glass");
        Ok(())
    }
}

fn parse_ratio(raw: &str) -> Result<f64, PassportError> {
    match raw.trim().parse::<f64>() {
        Ok(ratio) if ratio.is_finite() && ratio >= 0.0 => Ok(ratio),
        _ => Err(PassportError::InvalidArgument(format!(
            "culletRatio must be a non-negative number, got '{raw}'"
        ))),
    }
}

fn parse_inputs(raw: &str) -> Result<Vec<InputRef>, PassportError> {
    serde_json::from_str(raw).map_err(|e| {
        PassportError::InvalidArgument(format!(
            "inputsJson must be a JSON list of {{\"hash\"}} or {{\"seq\"}} references: {e}"
        ))
    })
}

/// Every input must name a raw-material event already on this record.
fn check_inputs(record: &ProductRecord, inputs: &[InputRef]) -> Result<(), PassportError> {
    let raw: Vec<_> = record
        .events
        .iter()
        .filter(|e| e.event_type == EventType::RawMaterialSupplied)
        .collect();
    for input in inputs {
        let found = match input {
            InputRef::Hash { hash } => raw.iter().any(|e| e.raw_material_hash() == Some(hash.as_str())),
            InputRef::Seq { seq } => raw.iter().any(|e| e.seq == *seq),
        };
        if !found {
            return Err(PassportError::ReferentialIntegrity(format!(
                "input {} does not match any RawMaterialSupplied event of product {}",
                describe_input(input),
                record.id
            )));
        }
    }
    Ok(())
}

fn describe_input(input: &InputRef) -> String {
    match input {
        InputRef::Hash { hash } => format!("hash '{hash}'"),
        InputRef::Seq { seq } => format!("seq {seq}"),
    }
}

pub struct AssembleProduct;

impl Transition for AssembleProduct {
    fn action(&self) -> Action {
        Action::AssembleProduct
    }

    fn event_type(&self) -> EventType {
        EventType::Assembled
    }

    fn validate(&self, args: &mut ArgReader<'_>) -> Result<EventPayload, PassportError> {
        Ok(EventPayload::Assembly(AssemblyPayload {
            assembly_hash: args.required("hash"),
            assembly_uri: args.required("uri"),
            sku: args.optional(),
        }))
    }

    fn apply(&self, record: &mut ProductRecord, _payload: &EventPayload) -> Result<(), PassportError> {
        record.set_kind("window");
        Ok(())
    }
}

/// Construction, demolition, recycling and landfill: a process document plus
/// an optional site.
pub struct SiteWork {
    action: Action,
    event_type: EventType,
}

impl Transition for SiteWork {
    fn action(&self) -> Action {
        self.action
    }

    fn event_type(&self) -> EventType {
        self.event_type
    }

    fn validate(&self, args: &mut ArgReader<'_>) -> Result<EventPayload, PassportError> {
        Ok(EventPayload::Site(SitePayload {
            process_hash: args.required("hash"),
            process_uri: args.required("uri"),
            site_id: args.optional(),
        }))
    }
}

static REGISTER_RAW_MATERIAL: RegisterRawMaterial = RegisterRawMaterial;
static MANUFACTURE_GLASS: ManufactureGlass = ManufactureGlass;
static ASSEMBLE_PRODUCT: AssembleProduct = AssembleProduct;
static CONSTRUCTION: SiteWork = SiteWork {
    action: Action::Construction,
    event_type: EventType::Constructed,
};
static DEMOLITION: SiteWork = SiteWork {
    action: Action::Demolition,
    event_type: EventType::Demolished,
};
static RECYCLING: SiteWork = SiteWork {
    action: Action::Recycling,
    event_type: EventType::Recycled,
};
static LAND_FILLING: SiteWork = SiteWork {
    action: Action::LandFilling,
    event_type: EventType::Landfilled,
};

/// The handler for a lifecycle action; `None` for creation and queries.
pub fn handler_for(action: Action) -> Option<&'static dyn Transition> {
    match action {
        Action::RegisterRawMaterial => Some(&REGISTER_RAW_MATERIAL),
        Action::ManufactureGlass => Some(&MANUFACTURE_GLASS),
        Action::AssembleProduct => Some(&ASSEMBLE_PRODUCT),
        Action::Construction => Some(&CONSTRUCTION),
        Action::Demolition => Some(&DEMOLITION),
        Action::Recycling => Some(&RECYCLING),
        Action::LandFilling => Some(&LAND_FILLING),
        Action::CreateProduct
        | Action::GetProductStatus
        | Action::GetHistory
        | Action::EvaluateCompliance => None,
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// Run one lifecycle transition inside the store's snapshot.
///
/// `args[0]` is the product identifier; the rest are the handler's
/// positional arguments. Nothing is written unless every check passes.
pub async fn run_transition<S: LedgerStorage>(
    handler: &dyn Transition,
    policy: &AccessPolicy,
    graph: &StageGraph,
    caller: &Caller,
    store: &mut ProductStore<'_, S>,
    args: &[String],
) -> Result<TransitionOutcome, PassportError> {
    let action = handler.action();
    policy.authorize(caller, action)?;

    let mut reader = ArgReader::new(args);
    let product_id = reader.required("productId");
    let payload = handler.validate(&mut reader);
    reader.finish()?;
    let payload = payload?;

    let mut record = store.get(&product_id).await?;

    let event_type = handler.event_type();
    let from = record.current_stage.clone();
    let to = event_type.target_stage();
    if !graph.is_legal(&from, &to) {
        warn!(product_id = %product_id, %from, %to, "illegal transition");
        return Err(PassportError::IllegalTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    handler.apply(&mut record, &payload)?;

    let at = iso_timestamp(store.tx_timestamp())?;
    let seq = record.append(event_type, &caller.msp_id, at, payload);
    store.put(&record).await?;
    store
        .notify(
            DPP_EVENT_TOPIC,
            &Notification {
                product_id: product_id.clone(),
                kind: event_type.to_string(),
                seq,
            },
        )
        .await?;

    info!(
        product_id = %product_id,
        event_type = %event_type,
        seq,
        stage = %record.current_stage,
        "transition applied"
    );
    Ok(TransitionOutcome {
        ok: true,
        product_id,
        current_stage: record.current_stage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use serde_json::json;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn raw_event(seq: u64, hash: &str) -> Event {
        Event {
            seq,
            event_type: EventType::RawMaterialSupplied,
            by: "Org1MSP".to_string(),
            at: "t".to_string(),
            payload: EventPayload::RawMaterial(RawMaterialPayload {
                raw_mat_hash: hash.to_string(),
                raw_mat_uri: "u".to_string(),
                batch_no: "b".to_string(),
            }),
        }
    }

    #[test]
    fn reader_names_every_missing_field() {
        let values = args(&["P-1", "", "  "]);
        let mut reader = ArgReader::new(&values);
        reader.required("productId");
        let _ = RegisterRawMaterial.validate(&mut reader);
        let err = reader.finish().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid argument: missing required argument(s): hash, uri, batchNo"
        );
    }

    #[test]
    fn manufacture_reads_optional_fields() {
        let values = args(&["h", "u", "", "F-1", "0.35", "[{\"seq\": 1}]"]);
        let mut reader = ArgReader::new(&values);
        let payload = ManufactureGlass.validate(&mut reader).unwrap();
        reader.finish().unwrap();
        assert_eq!(
            payload,
            EventPayload::Manufacture(ManufacturePayload {
                process_hash: "h".to_string(),
                process_uri: "u".to_string(),
                batch_no: None,
                furnace_id: Some("F-1".to_string()),
                cullet_ratio: Some(0.35),
                inputs: vec![InputRef::Seq { seq: 1 }],
            })
        );
    }

    #[test]
    fn bad_cullet_ratio_is_invalid() {
        for ratio in ["-0.1", "NaN", "inf", "lots"] {
            let values = args(&["h", "u", "", "", ratio]);
            let err = ManufactureGlass
                .validate(&mut ArgReader::new(&values))
                .unwrap_err();
            assert_eq!(err.kind(), "InvalidArgument", "{ratio}");
        }
    }

    #[test]
    fn malformed_inputs_are_invalid() {
        for inputs in ["not json", "{\"seq\": 1}", "[{}]", "[{\"seq\": -1}]"] {
            let values = args(&["h", "u", "", "", "", inputs]);
            let err = ManufactureGlass
                .validate(&mut ArgReader::new(&values))
                .unwrap_err();
            assert_eq!(err.kind(), "InvalidArgument", "{inputs}");
        }
    }

    #[test]
    fn inputs_must_reference_raw_material_events() {
        let mut record = ProductRecord::new("P-1", json!({}), "Org1MSP", "t".into());
        record.events.push(raw_event(1, "h1"));

        assert!(check_inputs(&record, &[InputRef::Seq { seq: 1 }]).is_ok());
        assert!(check_inputs(&record, &[InputRef::Hash { hash: "h1".into() }]).is_ok());

        let err = check_inputs(&record, &[InputRef::Seq { seq: 2 }]).unwrap_err();
        assert_eq!(err.kind(), "ReferentialIntegrityError");
        let err = check_inputs(&record, &[InputRef::Hash { hash: "h9".into() }]).unwrap_err();
        assert_eq!(err.kind(), "ReferentialIntegrityError");
    }

    #[test]
    fn manufacture_rejects_foreign_payload() {
        let mut record = ProductRecord::new("P-1", json!({}), "Org1MSP", "t".into());
        let payload = raw_event(1, "h1").payload;
        let err = ManufactureGlass.apply(&mut record, &payload).unwrap_err();
        assert_eq!(err.kind(), "InvalidArgument");
        assert_eq!(record, ProductRecord::new("P-1", json!({}), "Org1MSP", "t".into()));
    }

    #[test]
    fn whole_float_seq_input_is_accepted() {
        let values = args(&["h", "u", "", "", "", "[{\"seq\": 1.0}]"]);
        let payload = ManufactureGlass.validate(&mut ArgReader::new(&values)).unwrap();
        let EventPayload::Manufacture(p) = payload else {
            panic!("expected a manufacture payload");
        };
        assert_eq!(p.inputs, vec![InputRef::Seq { seq: 1 }]);
    }

    #[test]
    fn every_lifecycle_action_has_a_handler() {
        for action in Action::ALL {
            let handler = handler_for(action);
            let lifecycle = !action.is_read_only() && action != Action::CreateProduct;
            assert_eq!(handler.is_some(), lifecycle, "{action}");
            if let Some(h) = handler {
                assert_eq!(h.action(), action);
            }
        }
    }
}
