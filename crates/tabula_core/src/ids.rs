use ulid::Ulid;

/// Upper bound of the `id` column of every record table.
pub const MAX_ID_LEN: usize = 64;

/// Produces a new record id without touching the store.
///
/// ULIDs carry a millisecond timestamp and 80 random bits, so ids are unique
/// across processes and sort roughly by creation time.
pub fn generate_id() -> String {
    Ulid::new().to_string()
}

pub fn is_valid_id(value: &str) -> bool {
    !value.is_empty() && value.len() <= MAX_ID_LEN
}
