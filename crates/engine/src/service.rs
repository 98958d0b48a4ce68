//! Submit/evaluate gateway: one ledger snapshot per call.

use std::sync::Arc;

use dpp_storage::{CommitReceipt, LedgerStorage};
use tracing::{info, warn};

use crate::access::Caller;
use crate::action::Action;
use crate::contract::{PassportContract, Response};
use crate::error::PassportError;

/// A committed call: the ledger receipt and the contract's answer.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub receipt: CommitReceipt,
    pub response: Response,
}

/// Runs contract calls against a shared ledger.
///
/// Conflicting commits surface as [`PassportError::ConcurrentModification`];
/// retrying is up to the caller.
pub struct PassportService<S: LedgerStorage> {
    ledger: Arc<S>,
    contract: PassportContract,
}

impl<S: LedgerStorage> Clone for PassportService<S> {
    fn clone(&self) -> Self {
        PassportService {
            ledger: Arc::clone(&self.ledger),
            contract: self.contract.clone(),
        }
    }
}

impl<S: LedgerStorage> PassportService<S> {
    pub fn new(ledger: Arc<S>, contract: PassportContract) -> Self {
        PassportService { ledger, contract }
    }

    pub fn ledger(&self) -> &Arc<S> {
        &self.ledger
    }

    pub fn contract(&self) -> &PassportContract {
        &self.contract
    }

    /// Invoke and commit. Any error aborts the snapshot.
    pub async fn submit(
        &self,
        caller: &Caller,
        function: &str,
        args: &[String],
    ) -> Result<Submitted, PassportError> {
        let mut snapshot = self.ledger.begin_snapshot().await?;
        match self
            .contract
            .invoke(self.ledger.as_ref(), &mut snapshot, caller, function, args)
            .await
        {
            Ok(response) => {
                let receipt = self.ledger.commit_snapshot(snapshot).await.map_err(|e| {
                    warn!(function, msp = %caller.msp_id, error = %e, "commit rejected");
                    PassportError::from(e)
                })?;
                info!(
                    function,
                    tx_id = %receipt.tx_id,
                    block = receipt.block_number,
                    "transaction committed"
                );
                Ok(Submitted { receipt, response })
            }
            Err(e) => {
                self.discard(snapshot).await;
                warn!(function, msp = %caller.msp_id, kind = e.kind(), error = %e, "call rejected");
                Err(e)
            }
        }
    }

    /// Invoke and always discard. Nothing the call wrote is kept.
    pub async fn evaluate(
        &self,
        caller: &Caller,
        function: &str,
        args: &[String],
    ) -> Result<Response, PassportError> {
        let mut snapshot = self.ledger.begin_snapshot().await?;
        let result = self
            .contract
            .invoke(self.ledger.as_ref(), &mut snapshot, caller, function, args)
            .await;
        self.discard(snapshot).await;
        result
    }

    /// Evaluate queries, submit everything else.
    pub async fn call(
        &self,
        caller: &Caller,
        function: &str,
        args: &[String],
    ) -> Result<Response, PassportError> {
        if Action::from_function_name(function)?.is_read_only() {
            self.evaluate(caller, function, args).await
        } else {
            Ok(self.submit(caller, function, args).await?.response)
        }
    }

    /// Abort a snapshot. A failed abort never replaces the call's result.
    async fn discard(&self, snapshot: S::Snapshot) {
        if let Err(e) = self.ledger.abort_snapshot(snapshot).await {
            warn!(error = %e, "snapshot abort failed");
        }
    }
}
