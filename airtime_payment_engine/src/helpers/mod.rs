use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::TxReference;

/// Generates a fresh transaction reference, e.g. `DEP-4F7K2M9QX1BZ`.
///
/// The prefix identifies the flow that opened the intent; the suffix is random. Uniqueness is ultimately enforced by
/// the database constraint, not by this function.
pub fn new_reference(prefix: &str) -> TxReference {
    let suffix: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(12).map(|c| (c as char).to_ascii_uppercase()).collect();
    TxReference(format!("{prefix}-{suffix}"))
}
