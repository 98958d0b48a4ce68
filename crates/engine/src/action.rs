//! Invocable operations and function-name dispatch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PassportError;

/// A named operation a caller can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    CreateProduct,
    RegisterRawMaterial,
    ManufactureGlass,
    AssembleProduct,
    Construction,
    Demolition,
    Recycling,
    LandFilling,
    GetProductStatus,
    GetHistory,
    EvaluateCompliance,
}

/// Names earlier client releases invoke, mapped to the action they mean.
const LEGACY_ALIASES: &[(&str, Action)] = &[
    ("GetStatus", Action::GetProductStatus),
    ("constructProduct", Action::Construction),
    ("demolitionProduct", Action::Demolition),
    ("recyclingGlass", Action::Recycling),
    ("landFill", Action::LandFilling),
];

impl Action {
    pub const ALL: [Action; 11] = [
        Action::CreateProduct,
        Action::RegisterRawMaterial,
        Action::ManufactureGlass,
        Action::AssembleProduct,
        Action::Construction,
        Action::Demolition,
        Action::Recycling,
        Action::LandFilling,
        Action::GetProductStatus,
        Action::GetHistory,
        Action::EvaluateCompliance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateProduct => "CreateProduct",
            Action::RegisterRawMaterial => "RegisterRawMaterial",
            Action::ManufactureGlass => "ManufactureGlass",
            Action::AssembleProduct => "AssembleProduct",
            Action::Construction => "Construction",
            Action::Demolition => "Demolition",
            Action::Recycling => "Recycling",
            Action::LandFilling => "LandFilling",
            Action::GetProductStatus => "GetProductStatus",
            Action::GetHistory => "GetHistory",
            Action::EvaluateCompliance => "EvaluateCompliance",
        }
    }

    /// Queries never write; the service discards their snapshot.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Action::GetProductStatus | Action::GetHistory | Action::EvaluateCompliance
        )
    }

    /// Resolve an invoked function name.
    ///
    /// Accepts the canonical name, a namespace-qualified name such as
    /// `RawMaterial:RegisterRawMaterial`, or a legacy alias.
    pub fn from_function_name(name: &str) -> Result<Action, PassportError> {
        let bare = name.rsplit(':').next().unwrap_or(name);
        if let Ok(action) = bare.parse() {
            return Ok(action);
        }
        LEGACY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == bare)
            .map(|(_, action)| *action)
            .ok_or_else(|| PassportError::InvalidArgument(format!("unknown function '{name}'")))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = PassportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| PassportError::InvalidArgument(format!("unknown action '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
    }

    #[test]
    fn namespace_prefix_is_stripped() {
        assert_eq!(
            Action::from_function_name("RawMaterial:RegisterRawMaterial").unwrap(),
            Action::RegisterRawMaterial
        );
        assert_eq!(
            Action::from_function_name("DppCore:CreateProduct").unwrap(),
            Action::CreateProduct
        );
    }

    #[test]
    fn legacy_aliases_dispatch() {
        assert_eq!(
            Action::from_function_name("DppCore:GetStatus").unwrap(),
            Action::GetProductStatus
        );
        assert_eq!(
            Action::from_function_name("constructProduct").unwrap(),
            Action::Construction
        );
        assert_eq!(
            Action::from_function_name("demolitionProduct").unwrap(),
            Action::Demolition
        );
        assert_eq!(
            Action::from_function_name("recyclingGlass").unwrap(),
            Action::Recycling
        );
        assert_eq!(
            Action::from_function_name("landFill").unwrap(),
            Action::LandFilling
        );
    }

    #[test]
    fn unknown_function_is_invalid_argument() {
        let err = Action::from_function_name("DropTables").unwrap_err();
        assert_eq!(err.kind(), "InvalidArgument");
        assert!(err.to_string().contains("DropTables"));
    }

    #[test]
    fn only_queries_are_read_only() {
        let reads: Vec<_> = Action::ALL.into_iter().filter(Action::is_read_only).collect();
        assert_eq!(
            reads,
            vec![
                Action::GetProductStatus,
                Action::GetHistory,
                Action::EvaluateCompliance
            ]
        );
    }
}
