use serde::{Deserialize, Serialize};

/// JWT claims carried by a guest token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuestClaims {
    pub sub: i32,   // Guest id
    pub exp: usize, // Expiration timestamp (standard JWT claim)
    pub iat: usize, // Issued at timestamp (standard JWT claim)
}
