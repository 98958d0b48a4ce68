//! Function-name dispatch over one snapshot.

use dpp_storage::LedgerStorage;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::access::{AccessPolicy, Caller};
use crate::action::Action;
use crate::compliance::{self, ComplianceReport, Rule};
use crate::config::DeploymentConfig;
use crate::error::PassportError;
use crate::lifecycle::StageGraph;
use crate::record::{ProductRecord, StatusView};
use crate::store::{HistoryEntry, ProductStore};
use crate::transition::{
    handler_for, run_transition, ArgReader, Notification, TransitionOutcome, DPP_EVENT_TOPIC,
};

/// What an invocation answers with. Serializes to the wire JSON of the
/// corresponding action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Record(ProductRecord),
    Transition(TransitionOutcome),
    Status(StatusView),
    History(Vec<HistoryEntry>),
    Compliance(ComplianceReport),
}

/// The passport contract: immutable tables plus dispatch.
#[derive(Debug, Clone)]
pub struct PassportContract {
    policy: AccessPolicy,
    graph: StageGraph,
    rules: Vec<Rule>,
}

impl PassportContract {
    pub fn new(policy: AccessPolicy, graph: StageGraph, rules: Vec<Rule>) -> Self {
        PassportContract {
            policy,
            graph,
            rules,
        }
    }

    pub fn from_config(config: &DeploymentConfig) -> Self {
        PassportContract::new(
            config.access_policy(),
            config.stage_graph(),
            config.compliance_rules(),
        )
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// Run `function` with positional `args` inside `snapshot`.
    ///
    /// The caller owns the snapshot and decides whether to commit it. On
    /// error the snapshot may hold partial writes and must be aborted.
    pub async fn invoke<S: LedgerStorage>(
        &self,
        ledger: &S,
        snapshot: &mut S::Snapshot,
        caller: &Caller,
        function: &str,
        args: &[String],
    ) -> Result<Response, PassportError> {
        let action = Action::from_function_name(function)?;
        debug!(function, action = %action, msp = %caller.msp_id, "dispatch");
        let mut store = ProductStore::new(ledger, snapshot);

        if let Some(handler) = handler_for(action) {
            let outcome =
                run_transition(handler, &self.policy, &self.graph, caller, &mut store, args)
                    .await?;
            return Ok(Response::Transition(outcome));
        }

        match action {
            Action::CreateProduct => self.create_product(caller, &mut store, args).await,
            Action::GetProductStatus => self.product_status(caller, &mut store, args).await,
            Action::GetHistory => self.history(caller, &mut store, args).await,
            Action::EvaluateCompliance => self.compliance(caller, &mut store, args).await,
            other => Err(PassportError::InvalidArgument(format!(
                "no handler for {other}"
            ))),
        }
    }

    async fn create_product<S: LedgerStorage>(
        &self,
        caller: &Caller,
        store: &mut ProductStore<'_, S>,
        args: &[String],
    ) -> Result<Response, PassportError> {
        self.policy.authorize(caller, Action::CreateProduct)?;
        let mut reader = ArgReader::new(args);
        let product_id = reader.required("productId");
        let meta_json = reader.optional();
        reader.finish()?;

        let meta = match meta_json {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                PassportError::InvalidArgument(format!("metaJson must be valid JSON: {e}"))
            })?,
            None => Value::Object(serde_json::Map::new()),
        };

        let timestamp = store.tx_timestamp();
        let record = store
            .create(&product_id, meta, &caller.msp_id, timestamp)
            .await?;
        store
            .notify(
                DPP_EVENT_TOPIC,
                &Notification {
                    product_id: product_id.clone(),
                    kind: Action::CreateProduct.to_string(),
                    seq: 0,
                },
            )
            .await?;
        info!(product_id = %product_id, by = %caller.msp_id, "product created");
        Ok(Response::Record(record))
    }

    async fn product_status<S: LedgerStorage>(
        &self,
        caller: &Caller,
        store: &mut ProductStore<'_, S>,
        args: &[String],
    ) -> Result<Response, PassportError> {
        self.policy.authorize(caller, Action::GetProductStatus)?;
        let product_id = single_product_id(args)?;
        let record = store.get(&product_id).await?;
        Ok(Response::Status(record.status()))
    }

    async fn history<S: LedgerStorage>(
        &self,
        caller: &Caller,
        store: &mut ProductStore<'_, S>,
        args: &[String],
    ) -> Result<Response, PassportError> {
        self.policy.authorize(caller, Action::GetHistory)?;
        let product_id = single_product_id(args)?;
        let entries = store
            .history(&product_id)
            .await?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Response::History(entries))
    }

    async fn compliance<S: LedgerStorage>(
        &self,
        caller: &Caller,
        store: &mut ProductStore<'_, S>,
        args: &[String],
    ) -> Result<Response, PassportError> {
        self.policy.authorize(caller, Action::EvaluateCompliance)?;
        let mut reader = ArgReader::new(args);
        let product_id = reader.required("productId");
        let rules_json = reader.optional();
        reader.finish()?;

        let supplied: Option<Vec<Rule>> = rules_json
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    PassportError::InvalidArgument(format!("rulesJson is not a rule list: {e}"))
                })
            })
            .transpose()?;
        let rules = supplied.as_deref().unwrap_or(&self.rules);

        let record = store.get(&product_id).await?;
        Ok(Response::Compliance(compliance::evaluate(&record, rules)?))
    }
}

impl Default for PassportContract {
    fn default() -> Self {
        PassportContract::from_config(&DeploymentConfig::default())
    }
}

fn single_product_id(args: &[String]) -> Result<String, PassportError> {
    let mut reader = ArgReader::new(args);
    let product_id = reader.required("productId");
    reader.finish()?;
    Ok(product_id)
}
