use serde::Deserialize;

/// Query string of the invoice routes; `room` selects the staff path
#[derive(Debug, Default, Deserialize)]
pub struct SettlementQuery {
    pub room: Option<String>,
}

/// Whose bill a request is about
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementTarget {
    Room(String),
    Guest(i32),
}
