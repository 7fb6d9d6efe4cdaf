use thiserror::Error;

/// Misuse of the Reservation API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Complete on invalid reservation")]
    InvalidReservation,
    #[error("Double complete not allowed")]
    DoubleComplete,
}
