use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::restaurant::RestaurantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

/// One inbound phone call, recorded when the carrier webhook fires. Draft
/// creation verifies the call belongs to the restaurant it claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub id: CallId,
    pub restaurant_id: RestaurantId,
    pub from_number: String,
    pub to_number: String,
    pub started_at: DateTime<Utc>,
}
