use uuid::Uuid;

/// Snapshot of a claimed report handed from the dispatcher to a worker.
///
/// Workers never mutate it; every status write is keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageJob {
    pub id: Uuid,
    /// Staged filename under the upload directory.
    pub photo_reference: String,
}
