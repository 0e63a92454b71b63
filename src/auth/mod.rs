// Public API - what other modules can use
pub use token::TokenConfig;
pub use types::GuestClaims;

// Internal modules
mod token;
mod types;
