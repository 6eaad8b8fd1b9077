pub mod config;
pub mod domain;
pub mod errors;
pub mod menu;

pub use chrono;

pub use config::{AppConfig, CloverConfig, ConfigError, DatabaseConfig, LogFormat, ToastConfig};
pub use domain::call::{Call, CallId};
pub use domain::credential::{PosEnvironment, ProviderCredential};
pub use domain::menu::{
    ExternalIds, MenuCategory, MenuIndex, MenuItem, MenuSnapshot, ModifierGroup, ModifierOption,
    NormalizedMenu, ProviderEntityIds,
};
pub use domain::order::{
    DraftOrder, DraftRecord, Order, OrderId, OrderStatus, OrderTotals, PricingOutcome,
    SubmitOutcome,
};
pub use domain::restaurant::{PosProvider, Restaurant, RestaurantId, RestaurantStatus};
pub use errors::ServiceError;
pub use menu::search::search_menu;
pub use menu::validate::{
    build_draft_summary, validate_selections, DraftLine, DraftLineModifier, DraftLineOption,
    DraftSummary, Selection, SelectionModifier,
};
