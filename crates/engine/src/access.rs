//! Role-based access policy.
//!
//! Two static tables decide every call: organization (MSP id) to the roles it
//! holds, and action to the roles allowed to invoke it. Both come from the
//! deployment configuration and are immutable once the policy is built.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::action::Action;
use crate::error::PassportError;

pub const RAW_MATERIAL_SUPPLIER: &str = "RawMaterialSupplier";
pub const GLASS_MANUFACTURER: &str = "GlassManufacturer";
pub const ASSEMBLER: &str = "Assembler";
pub const CONSTRUCTION_TEAM: &str = "ConstructionTeam";
pub const DEMOLITION_TEAM: &str = "DemolitionTeam";
pub const GLASS_RECYCLER: &str = "GlassRecycler";
pub const LAND_FILLER: &str = "LandFiller";
pub const COMPLIANCE_AUDITOR: &str = "ComplianceAuditor";

/// A role label such as `GlassManufacturer`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Role(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Role::new(name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated identity behind a call.
///
/// Built per call by the transport from its authentication context; never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub msp_id: String,
}

impl Caller {
    pub fn new(msp_id: impl Into<String>) -> Self {
        Caller {
            msp_id: msp_id.into(),
        }
    }
}

/// Roles permitted to invoke one action.
///
/// Written as `"*"` (anyone) or a list of role names in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAllowed", into = "RawAllowed")]
pub enum AllowedRoles {
    Anyone,
    Roles(BTreeSet<Role>),
}

impl AllowedRoles {
    pub fn roles<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        AllowedRoles::Roles(roles.into_iter().map(Into::into).collect())
    }

    fn permits(&self, held: &BTreeSet<Role>) -> bool {
        match self {
            AllowedRoles::Anyone => true,
            AllowedRoles::Roles(allowed) => !allowed.is_disjoint(held),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawAllowed {
    Wildcard(String),
    List(Vec<Role>),
}

impl TryFrom<RawAllowed> for AllowedRoles {
    type Error = String;

    fn try_from(raw: RawAllowed) -> Result<Self, Self::Error> {
        match raw {
            RawAllowed::Wildcard(s) if s == "*" => Ok(AllowedRoles::Anyone),
            RawAllowed::Wildcard(s) => Err(format!(
                "expected \"*\" or a list of role names, got \"{s}\""
            )),
            RawAllowed::List(roles) => Ok(AllowedRoles::Roles(roles.into_iter().collect())),
        }
    }
}

impl From<AllowedRoles> for RawAllowed {
    fn from(allowed: AllowedRoles) -> Self {
        match allowed {
            AllowedRoles::Anyone => RawAllowed::Wildcard("*".to_string()),
            AllowedRoles::Roles(roles) => RawAllowed::List(roles.into_iter().collect()),
        }
    }
}

/// Immutable access tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    roles_of_msp: BTreeMap<String, BTreeSet<Role>>,
    allowed: BTreeMap<String, AllowedRoles>,
}

impl AccessPolicy {
    /// Build a policy from organization→roles and action name→allowed roles.
    pub fn new(
        roles_of_msp: BTreeMap<String, BTreeSet<Role>>,
        allowed: BTreeMap<String, AllowedRoles>,
    ) -> Self {
        AccessPolicy {
            roles_of_msp,
            allowed,
        }
    }

    /// Roles held by the caller's organization. Unmapped organizations hold none.
    pub fn role_set(&self, caller: &Caller) -> BTreeSet<Role> {
        self.roles_of_msp
            .get(&caller.msp_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Allowed roles for an action, or `None` when the table has no entry.
    pub fn allowed_roles(&self, action: Action) -> Option<&AllowedRoles> {
        self.allowed.get(action.as_str())
    }

    /// Whether a holder of `held` may invoke `action`. Actions missing from
    /// the table are closed to everyone.
    pub fn permits(&self, held: &BTreeSet<Role>, action: Action) -> bool {
        self.allowed_roles(action)
            .is_some_and(|allowed| allowed.permits(held))
    }

    /// Gate a call. Runs before any state is read.
    pub fn authorize(&self, caller: &Caller, action: Action) -> Result<(), PassportError> {
        let held = self.role_set(caller);
        if self.permits(&held, action) {
            debug!(msp = %caller.msp_id, action = %action, "authorized");
            return Ok(());
        }

        let required = match self.allowed_roles(action) {
            Some(AllowedRoles::Roles(roles)) => roles.iter().map(|r| r.to_string()).collect(),
            _ => Vec::new(),
        };
        warn!(msp = %caller.msp_id, action = %action, "access denied");
        Err(PassportError::Denied {
            action: action.to_string(),
            msp: caller.msp_id.clone(),
            roles: held.iter().map(|r| r.to_string()).collect(),
            required,
        })
    }

    pub fn organizations(&self) -> &BTreeMap<String, BTreeSet<Role>> {
        &self.roles_of_msp
    }

    pub fn action_table(&self) -> &BTreeMap<String, AllowedRoles> {
        &self.allowed
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        AccessPolicy::new(default_roles(), default_policy())
    }
}

/// Built-in organization→roles table.
pub fn default_roles() -> BTreeMap<String, BTreeSet<Role>> {
    let table: [(&str, &[&str]); 4] = [
        ("Org1MSP", &[RAW_MATERIAL_SUPPLIER]),
        ("Org2MSP", &[GLASS_MANUFACTURER]),
        (
            "Org3MSP",
            &[
                ASSEMBLER,
                CONSTRUCTION_TEAM,
                DEMOLITION_TEAM,
                GLASS_RECYCLER,
                LAND_FILLER,
            ],
        ),
        ("Org4MSP", &[COMPLIANCE_AUDITOR]),
    ];
    table
        .into_iter()
        .map(|(msp, roles)| (msp.to_string(), roles.iter().copied().map(Role::from).collect()))
        .collect()
}

/// Built-in action→allowed roles table.
pub fn default_policy() -> BTreeMap<String, AllowedRoles> {
    Action::ALL
        .into_iter()
        .map(|action| {
            let allowed = match action {
                Action::CreateProduct | Action::RegisterRawMaterial => {
                    AllowedRoles::roles([RAW_MATERIAL_SUPPLIER])
                }
                Action::ManufactureGlass => AllowedRoles::roles([GLASS_MANUFACTURER]),
                Action::AssembleProduct => AllowedRoles::roles([ASSEMBLER]),
                Action::Construction => AllowedRoles::roles([CONSTRUCTION_TEAM]),
                Action::Demolition => AllowedRoles::roles([DEMOLITION_TEAM]),
                Action::Recycling => AllowedRoles::roles([GLASS_RECYCLER]),
                Action::LandFilling => AllowedRoles::roles([LAND_FILLER]),
                Action::GetProductStatus | Action::GetHistory => AllowedRoles::Anyone,
                Action::EvaluateCompliance => AllowedRoles::roles([COMPLIANCE_AUDITOR]),
            };
            (action.as_str().to_string(), allowed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_organization_has_no_roles() {
        let policy = AccessPolicy::default();
        assert!(policy.role_set(&Caller::new("Org9MSP")).is_empty());
    }

    #[test]
    fn org3_holds_every_downstream_role() {
        let policy = AccessPolicy::default();
        let roles = policy.role_set(&Caller::new("Org3MSP"));
        assert_eq!(roles.len(), 5);
        assert!(roles.contains(&Role::from(LAND_FILLER)));
    }

    #[test]
    fn wildcard_admits_unmapped_callers() {
        let policy = AccessPolicy::default();
        assert!(policy
            .authorize(&Caller::new("Org9MSP"), Action::GetHistory)
            .is_ok());
    }

    #[test]
    fn wrong_role_is_denied_with_details() {
        let policy = AccessPolicy::default();
        let err = policy
            .authorize(&Caller::new("Org2MSP"), Action::RegisterRawMaterial)
            .unwrap_err();
        assert_eq!(
            err,
            PassportError::Denied {
                action: "RegisterRawMaterial".to_string(),
                msp: "Org2MSP".to_string(),
                roles: vec!["GlassManufacturer".to_string()],
                required: vec!["RawMaterialSupplier".to_string()],
            }
        );
    }

    #[test]
    fn action_missing_from_table_fails_closed() {
        let policy = AccessPolicy::new(default_roles(), BTreeMap::new());
        let err = policy
            .authorize(&Caller::new("Org1MSP"), Action::CreateProduct)
            .unwrap_err();
        match err {
            PassportError::Denied { required, .. } => assert!(required.is_empty()),
            other => panic!("expected Denied, got {other:?}"),
        }
    }

    #[test]
    fn allowed_roles_parse_from_json() {
        let any: AllowedRoles = serde_json::from_str("\"*\"").unwrap();
        assert_eq!(any, AllowedRoles::Anyone);
        let some: AllowedRoles = serde_json::from_str("[\"Assembler\"]").unwrap();
        assert_eq!(some, AllowedRoles::roles([ASSEMBLER]));
        assert!(serde_json::from_str::<AllowedRoles>("\"Assembler\"").is_err());
    }
}
