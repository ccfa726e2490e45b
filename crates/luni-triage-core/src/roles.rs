//! Account roles and where each one lands after sign-in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    PetOwner,
    Veterinarian,
    VetStaff,
    Groomer,
    Trainer,
    Admin,
    Support,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::PetOwner,
        Role::Veterinarian,
        Role::VetStaff,
        Role::Groomer,
        Role::Trainer,
        Role::Admin,
        Role::Support,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::PetOwner => "pet_owner",
            Role::Veterinarian => "veterinarian",
            Role::VetStaff => "vet_staff",
            Role::Groomer => "groomer",
            Role::Trainer => "trainer",
            Role::Admin => "admin",
            Role::Support => "support",
        }
    }

    /// Landing route after sign-in.
    pub fn dashboard_route(self) -> &'static str {
        match self {
            Role::PetOwner => "/dashboard/owner",
            Role::Veterinarian => "/dashboard/vet",
            Role::VetStaff => "/dashboard/clinic",
            Role::Groomer => "/dashboard/groomer",
            Role::Trainer => "/dashboard/trainer",
            Role::Admin => "/admin",
            Role::Support => "/support",
        }
    }

    /// Roles that can use the triage chat.
    pub fn can_triage(self) -> bool {
        matches!(self, Role::PetOwner | Role::Admin | Role::Support)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pet_owner" => Ok(Role::PetOwner),
            "veterinarian" => Ok(Role::Veterinarian),
            "vet_staff" => Ok(Role::VetStaff),
            "groomer" => Ok(Role::Groomer),
            "trainer" => Ok(Role::Trainer),
            "admin" => Ok(Role::Admin),
            "support" => Ok(Role::Support),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}
