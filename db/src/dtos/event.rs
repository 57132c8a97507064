/// Outcome of recording a processed payment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventInsert {
    Recorded,
    /// The event id was already present. Nothing was written.
    Duplicate,
}

/// Outcome of a write guarded by a processed-event marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied<T> {
    /// The marker was new and the write committed together with it.
    Applied(T),
    /// The marker already existed. Nothing was written.
    Duplicate,
}
