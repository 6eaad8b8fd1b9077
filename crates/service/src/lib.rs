//! Service layer: tenant resolution, the order pipeline, and credential
//! administration, wired together by `bootstrap`.

pub mod bootstrap;
pub mod credentials;
pub mod pipeline;
pub mod tenant;

pub use bootstrap::{
    bootstrap, bootstrap_with_config, build_application, init_logging, Application,
    BootstrapError,
};
pub use credentials::{CredentialService, CredentialUpdate};
pub use pipeline::{OrderPipeline, SearchHit, SearchHitGroup, SearchHitOption};
pub use tenant::{CallRegistry, TenantResolver};
