use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestaurantId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestaurantStatus {
    Active,
    Inactive,
}

impl RestaurantStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

/// The POS backends the pipeline can dispatch to. Adding a provider means
/// adding a variant here and one adapter implementation; the pipeline itself
/// never changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosProvider {
    Toast,
    Clover,
}

impl PosProvider {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "toast" => Some(Self::Toast),
            "clover" => Some(Self::Clover),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Toast => "toast",
            Self::Clover => "clover",
        }
    }
}

impl std::fmt::Display for PosProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tenant. Created during onboarding, never deleted, only deactivated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub phone_number: String,
    pub timezone: String,
    pub status: RestaurantStatus,
    /// Stored as configured; parsed lazily so tenants with a stale or unset
    /// value can still serve menu lookups.
    pub pos_provider: String,
}

impl Restaurant {
    pub fn is_active(&self) -> bool {
        self.status == RestaurantStatus::Active
    }

    /// The configured POS backend. An unset or unrecognized value is a hard
    /// configuration error, never a silent default.
    pub fn provider(&self) -> Result<PosProvider, ServiceError> {
        PosProvider::parse(&self.pos_provider).ok_or_else(|| {
            ServiceError::Misconfigured(format!(
                "restaurant {} has unsupported pos provider `{}`",
                self.id.0, self.pos_provider
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::ServiceError;

    use super::{PosProvider, Restaurant, RestaurantId, RestaurantStatus};

    fn restaurant(provider: &str) -> Restaurant {
        Restaurant {
            id: RestaurantId("r-1".to_owned()),
            name: "Sample Diner".to_owned(),
            phone_number: "+15551234567".to_owned(),
            timezone: "America/Los_Angeles".to_owned(),
            status: RestaurantStatus::Active,
            pos_provider: provider.to_owned(),
        }
    }

    #[test]
    fn provider_parses_known_values_case_insensitively() {
        assert_eq!(restaurant("toast").provider().expect("toast"), PosProvider::Toast);
        assert_eq!(restaurant("Clover").provider().expect("clover"), PosProvider::Clover);
    }

    #[test]
    fn unknown_provider_is_a_configuration_error() {
        let error = restaurant("square").provider().expect_err("should fail");
        assert!(matches!(error, ServiceError::Misconfigured(_)));
    }

    #[test]
    fn empty_provider_is_a_configuration_error() {
        assert!(restaurant("").provider().is_err());
    }
}
