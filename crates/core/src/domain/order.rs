use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::call::CallId;
use crate::domain::restaurant::RestaurantId;
use crate::errors::ServiceError;
use crate::menu::validate::{DraftSummary, Selection};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Draft,
    Priced,
    Confirmed,
}

impl OrderStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "priced" => Some(Self::Priced),
            "confirmed" => Some(Self::Confirmed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Priced => "priced",
            Self::Confirmed => "confirmed",
        }
    }
}

/// The caller-assembled draft: selections plus pickup metadata. This is the
/// input both to validation and to the provider payload mappers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftOrder {
    pub selections: Vec<Selection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_phone: Option<String>,
}

/// What `draft_json` holds on an order row: the draft as submitted plus the
/// summary computed at draft time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    #[serde(flatten)]
    pub draft: DraftOrder,
    pub summary: DraftSummary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl OrderTotals {
    pub fn untaxed(subtotal_cents: i64) -> Self {
        Self { subtotal_cents, tax_cents: 0, total_cents: subtotal_cents }
    }
}

/// Provider-returned pricing, persisted as `priced_json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingOutcome {
    /// `provider` for live responses, `local` for computed pricing,
    /// `mock` under the testing short-circuit.
    pub pricing_mode: String,
    pub totals: OrderTotals,
    /// Raw provider response body kept verbatim for diagnosis.
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Result of an idempotent submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub provider_order_id: String,
    pub already_submitted: bool,
    pub confirmation: String,
}

/// One order row. Status only ever moves forward; confirmed orders are
/// terminal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub restaurant_id: RestaurantId,
    pub call_id: Option<CallId>,
    pub status: OrderStatus,
    pub draft: DraftRecord,
    pub priced: Option<PricingOutcome>,
    pub provider_order_id: Option<String>,
    /// Caller-supplied idempotency key, unique across all orders.
    pub client_order_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self.status, next),
            (OrderStatus::Draft, OrderStatus::Priced)
                | (OrderStatus::Draft, OrderStatus::Confirmed)
                | (OrderStatus::Priced, OrderStatus::Priced)
                | (OrderStatus::Priced, OrderStatus::Confirmed)
        )
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), ServiceError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(ServiceError::conflict(format!(
            "order {} cannot move from {} to {}",
            self.id.0,
            self.status.as_str(),
            next.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::call::CallId;
    use crate::domain::restaurant::RestaurantId;
    use crate::errors::ServiceError;
    use crate::menu::validate::DraftSummary;

    use super::{DraftOrder, DraftRecord, Order, OrderId, OrderStatus};

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId("o-1".to_owned()),
            restaurant_id: RestaurantId("r-1".to_owned()),
            call_id: Some(CallId("c-1".to_owned())),
            status,
            draft: DraftRecord {
                draft: DraftOrder::default(),
                summary: DraftSummary::default(),
            },
            priced: None,
            provider_order_id: None,
            client_order_id: "key-1".to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn draft_can_be_priced_then_confirmed() {
        let mut order = order(OrderStatus::Draft);
        order.transition_to(OrderStatus::Priced).expect("draft -> priced");
        order.transition_to(OrderStatus::Confirmed).expect("priced -> confirmed");
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[test]
    fn draft_can_be_confirmed_without_pricing() {
        let mut order = order(OrderStatus::Draft);
        order.transition_to(OrderStatus::Confirmed).expect("draft -> confirmed");
    }

    #[test]
    fn priced_order_can_be_repriced_until_confirmed() {
        let mut order = order(OrderStatus::Priced);
        order.transition_to(OrderStatus::Priced).expect("reprice");
        order.transition_to(OrderStatus::Confirmed).expect("confirm");
        assert!(order.transition_to(OrderStatus::Priced).is_err());
    }

    #[test]
    fn confirmed_orders_never_regress() {
        let mut order = order(OrderStatus::Confirmed);
        for next in [OrderStatus::Draft, OrderStatus::Priced, OrderStatus::Confirmed] {
            let error = order.transition_to(next).expect_err("terminal");
            assert!(matches!(error, ServiceError::Conflict { .. }));
        }
    }

    #[test]
    fn draft_record_json_flattens_draft_fields() {
        let record = DraftRecord { draft: DraftOrder::default(), summary: DraftSummary::default() };
        let json = serde_json::to_value(&record).expect("serialize");
        assert!(json.get("selections").is_some());
        assert!(json.get("summary").is_some());
        assert!(json.get("draft").is_none());
    }
}
