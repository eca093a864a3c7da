/// Lowest render queue handed to a decal.
pub const DECAL_QUEUE_MIN: i32 = 2100;
/// Highest render queue handed to a decal.
pub const DECAL_QUEUE_MAX: i32 = 2400;

/// Hands out draw-order slots from a cyclic range so overlapping decals
/// sort deterministically by creation order.
#[derive(Debug, Clone)]
pub struct RenderQueueAllocator {
    min: i32,
    max: i32,
    last: Option<i32>,
}

impl RenderQueueAllocator {
    pub fn new() -> Self {
        Self::with_range(DECAL_QUEUE_MIN, DECAL_QUEUE_MAX)
    }

    /// An allocator over `min..=max`. A reversed range is swapped.
    pub fn with_range(min: i32, max: i32) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
            last: None,
        }
    }

    /// Next slot, wrapping to the start of the range after the end.
    pub fn allocate(&mut self) -> i32 {
        let next = match self.last {
            Some(last) if last < self.max => last + 1,
            _ => self.min,
        };
        self.last = Some(next);
        next
    }
}

impl Default for RenderQueueAllocator {
    fn default() -> Self {
        Self::new()
    }
}
