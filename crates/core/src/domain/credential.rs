use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::domain::restaurant::{PosProvider, RestaurantId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosEnvironment {
    Sandbox,
    Prod,
}

impl PosEnvironment {
    /// Anything mentioning "prod" selects production; everything else is
    /// sandbox. Matches how credentials arrive from provider dashboards.
    pub fn parse(raw: &str) -> Self {
        if raw.to_lowercase().contains("prod") {
            Self::Prod
        } else {
            Self::Sandbox
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Prod => "prod",
        }
    }
}

/// Per-restaurant, per-provider OAuth/API credentials plus the cached
/// access token. The secret never leaves this type unredacted; token
/// refresh is a read-modify-write against the durable store.
#[derive(Clone, Debug)]
pub struct ProviderCredential {
    pub restaurant_id: RestaurantId,
    pub provider: PosProvider,
    /// Provider-native merchant reference: Toast restaurant GUID or Clover
    /// merchant id.
    pub merchant_ref: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub environment: PosEnvironment,
    pub access_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

impl ProviderCredential {
    /// A cached token is usable only while it has more than `skew_secs`
    /// of validity left.
    pub fn token_valid_for(&self, skew_secs: i64) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        let expires_at = self.token_expires_at?;
        if Utc::now() + chrono::Duration::seconds(skew_secs) < expires_at {
            Some(token)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use secrecy::SecretString;

    use crate::domain::restaurant::{PosProvider, RestaurantId};

    use super::{PosEnvironment, ProviderCredential};

    fn credential(expires_in_secs: i64) -> ProviderCredential {
        ProviderCredential {
            restaurant_id: RestaurantId("r-1".to_owned()),
            provider: PosProvider::Toast,
            merchant_ref: "guid-1".to_owned(),
            client_id: "client".to_owned(),
            client_secret: SecretString::from("secret"),
            environment: PosEnvironment::Sandbox,
            access_token: Some("cached".to_owned()),
            token_expires_at: Some(Utc::now() + Duration::seconds(expires_in_secs)),
        }
    }

    #[test]
    fn token_with_ample_validity_is_reused() {
        assert_eq!(credential(3600).token_valid_for(60), Some("cached"));
    }

    #[test]
    fn token_inside_the_skew_window_is_not_reused() {
        assert_eq!(credential(30).token_valid_for(60), None);
    }

    #[test]
    fn environment_parse_matches_dashboard_spellings() {
        assert_eq!(PosEnvironment::parse("PRODUCTION"), PosEnvironment::Prod);
        assert_eq!(PosEnvironment::parse("sandbox"), PosEnvironment::Sandbox);
        assert_eq!(PosEnvironment::parse(""), PosEnvironment::Sandbox);
    }
}
