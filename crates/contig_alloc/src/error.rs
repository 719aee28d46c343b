/// Failure of a contiguous allocation request.
///
/// Both variants surface the same way to most callers (fall back to
/// non-contiguous allocation or propagate); the distinction exists for
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// No contiguous run satisfied the request within its probe budget.
    #[error("insufficient contiguous physical memory")]
    ResourceExhausted,
    /// A run was found but could not be mapped; its frames were returned to
    /// the pool.
    #[error("kernel address space mapping failed")]
    MappingFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum MapError {
    #[error("kernel virtual address reservation failed")]
    ReservationFailed,
    #[error("wiring the mapped range failed")]
    WireFailed,
}
