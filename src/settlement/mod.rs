// Guest settlement: invoice preview and the atomic checkout

// Public API - what other modules can use
pub use errors::SettlementError;
pub use handlers::{checkout, preview_invoice};
pub use models::{
    BillingState, ChargeLine, ChargeSource, GuestStatus, GuestStay, InvoiceDraft, InvoiceModel,
    InvoicePreview,
};
pub use repository::{
    ChargeLedger, GuestDirectory, InMemoryHotelStore, PostgresChargeLedger,
    PostgresGuestDirectory, PostgresSettlementUnitOfWork, SettlementStep, SettlementUnitOfWork,
};
pub use service::{stay_days, SettlementEngine, DEFAULT_PAYMENT_METHOD};

// Internal modules
mod errors;
mod handlers;
pub mod models;
pub mod repository;
mod service;
mod types;
