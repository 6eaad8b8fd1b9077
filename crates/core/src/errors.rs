use thiserror::Error;

/// The single error taxonomy surfaced by every pipeline operation.
///
/// Variants map one-to-one onto the outcomes an operator or the inbound
/// layer needs to distinguish: absent/unowned entities, inactive tenants,
/// selection rule violations (with the complete problem list), idempotency
/// conflicts, provider-side failures split by fault class, and
/// configuration gaps.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("restaurant {id} is not active")]
    Forbidden { id: String },
    #[error("invalid selections: {}", errors.join("; "))]
    ValidationFailed { errors: Vec<String> },
    #[error("conflict: {detail}")]
    Conflict { detail: String },
    #[error("{provider} upstream failure{}: {body}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    UpstreamFailure { provider: &'static str, status: Option<u16>, body: String },
    #[error("{provider} rejected the request (status {status}): {body}")]
    ProviderRejected { provider: &'static str, status: u16, body: String },
    #[error("missing {provider} mapping for {entity} `{id}`")]
    BadMapping { provider: &'static str, entity: &'static str, id: String },
    #[error("misconfigured: {0}")]
    Misconfigured(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::Conflict { detail: detail.into() }
    }

    /// True for failures the caller may safely retry by resubmitting with
    /// the same idempotency key.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamFailure { .. } | Self::Storage(_))
    }
}
