use dpp_storage::StorageError;

/// All errors a passport call can fail with.
///
/// Every error is terminal for the call: the surrounding snapshot is aborted
/// and nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PassportError {
    /// A required argument is missing or empty, or an argument does not parse.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No record exists under the product identifier.
    #[error("product {0} not found")]
    NotFound(String),

    /// A record already exists under the product identifier.
    #[error("product {0} already exists")]
    AlreadyExists(String),

    /// The caller's organization holds none of the roles the action requires.
    #[error(
        "access denied: {msp} (roles [{}]) may not invoke {action}; requires one of [{}]",
        .roles.join(", "),
        .required.join(", ")
    )]
    Denied {
        action: String,
        msp: String,
        roles: Vec<String>,
        required: Vec<String>,
    },

    /// The lifecycle graph has no edge from the persisted stage to the target.
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    /// An input references an event this product does not have.
    #[error("referential integrity: {0}")]
    ReferentialIntegrity(String),

    /// Another transaction committed a newer version of a key this one read.
    #[error("concurrent modification of {key}; retry the transaction")]
    ConcurrentModification { key: String },

    /// A persisted value could not be decoded.
    #[error("corrupt ledger value under {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Any other ledger failure.
    #[error("ledger error: {0}")]
    Storage(String),
}

impl PassportError {
    /// Stable tag for audit logs and machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            PassportError::InvalidArgument(_) => "InvalidArgument",
            PassportError::NotFound(_) => "NotFound",
            PassportError::AlreadyExists(_) => "AlreadyExists",
            PassportError::Denied { .. } => "Denied",
            PassportError::IllegalTransition { .. } => "IllegalTransition",
            PassportError::ReferentialIntegrity(_) => "ReferentialIntegrityError",
            PassportError::ConcurrentModification { .. } => "ConcurrentModification",
            PassportError::Corrupt { .. } => "Corrupt",
            PassportError::Storage(_) => "Storage",
        }
    }
}

impl From<StorageError> for PassportError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ConcurrentConflict { key, .. } => {
                PassportError::ConcurrentModification { key }
            }
            StorageError::Backend(msg) => PassportError::Storage(msg),
        }
    }
}

/// Errors loading a deployment configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("unsupported configuration format for {path}: expected a .toml or .json file")]
    UnsupportedFormat { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_message_names_everything() {
        let err = PassportError::Denied {
            action: "RegisterRawMaterial".to_string(),
            msp: "Org2MSP".to_string(),
            roles: vec!["GlassManufacturer".to_string()],
            required: vec!["RawMaterialSupplier".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Org2MSP"));
        assert!(msg.contains("GlassManufacturer"));
        assert!(msg.contains("RegisterRawMaterial"));
        assert!(msg.contains("RawMaterialSupplier"));
        assert_eq!(err.kind(), "Denied");
    }

    #[test]
    fn storage_conflict_becomes_concurrent_modification() {
        let err: PassportError = StorageError::ConcurrentConflict {
            key: "P-1".to_string(),
            expected_version: 3,
        }
        .into();
        assert_eq!(
            err,
            PassportError::ConcurrentModification {
                key: "P-1".to_string()
            }
        );
    }
}
