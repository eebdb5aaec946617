pub mod amounts;
pub mod authorization;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod orchestrator;
pub mod reconcile;
pub mod session;

pub use amounts::{AmountInvalidReason, ResolvedAmounts};
pub use authorization::{AuthorizationApi, BackendAuthorizationClient};
pub use config::PortalConfig;
pub use error::PaymentError;
pub use gateway::{CaptureWidget, GatewayApi, HostedGatewayClient};
pub use models::{
    AmountSelection, AuthorizationStatus, Invoice, MinimumPaymentInfo, PaymentAuthorization,
    PaymentRecord, PaymentStatus,
};
pub use orchestrator::{AttemptState, ConfirmationOrchestrator, SubmitOutcome};
pub use reconcile::{BackendReconciliationClient, ReconcileOutcome, ReconciliationApi};
pub use session::{PaymentSession, SessionPhase};
