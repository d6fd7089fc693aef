//! Splitting the work list into per-worker chunks.

/// Splits `items` into at most `workers` contiguous, order-preserving chunks.
///
/// Exactly `min(items.len(), workers)` chunks are produced. Chunk sizes
/// differ by at most one: the first `len % workers` chunks hold
/// `ceil(len / workers)` items, the remainder `floor(len / workers)`.
/// Concatenating the chunks in order yields `items` unchanged.
///
/// An empty input yields no chunks. A `workers` of zero is treated as one.
///
/// # Example
/// ```rust
/// use colprobe_core::partition::partition;
///
/// let chunks = partition(&[1, 2, 3, 4, 5], 2);
/// assert_eq!(chunks, vec![&[1, 2, 3][..], &[4, 5][..]]);
/// ```
pub fn partition<T>(items: &[T], workers: usize) -> Vec<&[T]> {
    let workers = workers.max(1);
    let count = workers.min(items.len());
    if count == 0 {
        return Vec::new();
    }

    let base = items.len().checked_div(count).unwrap_or_default();
    let extra = items.len().checked_rem(count).unwrap_or_default();

    let mut chunks = Vec::with_capacity(count);
    let mut rest = items;
    for index in 0..count {
        let size = if index < extra {
            base.saturating_add(1)
        } else {
            base
        };
        let (head, tail) = rest.split_at(size);
        chunks.push(head);
        rest = tail;
    }

    debug_assert!(rest.is_empty());
    chunks
}
