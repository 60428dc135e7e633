/// One byte range of the resource, fetched by a single worker.
///
/// Offsets are half-open: the segment covers `start..end`. On the wire this
/// becomes the inclusive header `bytes=start-(end - 1)`, so neighbouring
/// segments meet exactly at `segments[i].end == segments[i + 1].start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

/// Lifecycle of a segment during a download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentState {
    Pending,
    /// Empty range (`start >= end`). No request is made and the part file
    /// stays empty.
    Degenerate,
    Fetching,
    Done { bytes: u64 },
    Failed { reason: String },
}

impl Segment {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_degenerate(&self) -> bool {
        self.start >= self.end
    }

    /// Value for the `Range` header, or `None` for a degenerate segment.
    pub fn range_header(&self) -> Option<String> {
        if self.is_degenerate() {
            return None;
        }
        Some(format!(
            "bytes={start}-{end}",
            start = self.start,
            end = self.end - 1
        ))
    }

    pub fn initial_state(&self) -> SegmentState {
        if self.is_degenerate() {
            SegmentState::Degenerate
        } else {
            SegmentState::Pending
        }
    }
}

/// Splits `total_size` bytes into exactly `concurrency` contiguous segments.
///
/// Every segment but the last gets `total_size / concurrency` bytes; the last
/// one absorbs the remainder. When `concurrency > total_size` the leading
/// segments are degenerate.
pub fn partition(total_size: u64, concurrency: usize) -> Vec<Segment> {
    let count = concurrency.max(1);
    let part_size = total_size / count as u64;

    (0..count)
        .map(|index| {
            let start = index as u64 * part_size;
            let end = if index + 1 == count {
                total_size
            } else {
                start + part_size
            };
            Segment { index, start, end }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(segments: &[Segment], total_size: u64) {
        assert_eq!(segments.first().map(|s| s.start), Some(0));
        assert_eq!(segments.last().map(|s| s.end), Some(total_size));
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap at seam");
        }
        let covered: u64 = segments.iter().map(Segment::len).sum();
        assert_eq!(covered, total_size);
    }

    #[test]
    fn test_partition_remainder_goes_to_last() {
        let segments = partition(100, 3);

        assert_eq!(segments.len(), 3);
        assert_covers(&segments, 100);
        assert_eq!(segments[0].len(), 33);
        assert_eq!(segments[1].len(), 33);
        assert_eq!(segments[2].len(), 34);
    }

    #[test]
    fn test_partition_even_split() {
        let segments = partition(1000, 4);

        assert_covers(&segments, 1000);
        assert!(segments.iter().all(|s| s.len() == 250));
        assert_eq!(segments[3].range_header().unwrap(), "bytes=750-999");
    }

    #[test]
    fn test_partition_more_workers_than_bytes() {
        let segments = partition(2, 5);

        assert_eq!(segments.len(), 5);
        assert_covers(&segments, 2);
        assert!(segments[..4].iter().all(Segment::is_degenerate));
        assert_eq!(segments[4].range_header().unwrap(), "bytes=0-1");
        assert_eq!(segments[0].initial_state(), SegmentState::Degenerate);
        assert_eq!(segments[4].initial_state(), SegmentState::Pending);
    }

    #[test]
    fn test_partition_single_segment_spans_resource() {
        let segments = partition(4096, 1);

        assert_eq!(
            segments,
            vec![Segment {
                index: 0,
                start: 0,
                end: 4096
            }]
        );
    }

    #[test]
    fn test_partition_many_shapes() {
        for total_size in [1u64, 7, 99, 100, 1023, 65_537] {
            for concurrency in 1..=16 {
                let segments = partition(total_size, concurrency);
                assert_eq!(segments.len(), concurrency);
                assert_covers(&segments, total_size);
                for (i, s) in segments.iter().enumerate() {
                    assert_eq!(s.index, i);
                }
            }
        }
    }

    #[test]
    fn test_range_header_is_inclusive() {
        let segment = Segment {
            index: 1,
            start: 33,
            end: 66,
        };
        assert_eq!(segment.range_header().unwrap(), "bytes=33-65");
        assert_eq!(segment.len(), 33);

        let empty = Segment {
            index: 0,
            start: 0,
            end: 0,
        };
        assert!(empty.range_header().is_none());
    }
}
