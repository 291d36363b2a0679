use std::ops::Range;

use crate::error::{FetchError, Result};

/// A part of the remote object fetched by one ranged request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Part index (0-based)
    pub index: u32,
    /// Starting byte offset
    pub start: u64,
    /// Ending byte offset (exclusive)
    pub end:   u64,
}

impl Segment {
    pub fn len(&self) -> u64 { self.end - self.start }

    pub fn is_empty(&self) -> bool { self.start >= self.end }

    pub fn range(&self) -> Range<u64> { self.start..self.end }
}

/// Split `total_size` bytes into consecutive parts of `part_size` bytes.
///
/// Every part is `part_size` long except the last, which takes the remainder.
/// An empty object has no parts.
pub fn plan_segments(total_size: u64, part_size: u64) -> Result<Vec<Segment>> {
    if part_size == 0 {
        return Err(FetchError::InvalidState(
            "part size must be greater than 0".into(),
        ));
    }

    let count = total_size.div_ceil(part_size);
    let count = u32::try_from(count).map_err(|_| {
        FetchError::InvalidState(format!(
            "{total_size} bytes in {part_size}-byte parts exceeds the part limit"
        ))
    })?;

    Ok((0..count)
        .map(|index| {
            let start = u64::from(index) * part_size;
            Segment {
                index,
                start,
                end: (start + part_size).min(total_size),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split() {
        let parts = plan_segments(300, 100).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].range(), 0..100);
        assert_eq!(parts[2].range(), 200..300);
    }

    #[test]
    fn last_part_takes_the_remainder() {
        let parts = plan_segments(250, 100).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], Segment { index: 2, start: 200, end: 250 });
        assert_eq!(parts[2].len(), 50);
    }

    #[test]
    fn parts_cover_the_object_without_overlap() {
        let parts = plan_segments(1_000_003, 4096).unwrap();
        let mut next = 0;
        for part in &parts {
            assert_eq!(part.start, next);
            assert!(!part.is_empty());
            next = part.end;
        }
        assert_eq!(next, 1_000_003);
    }

    #[test]
    fn object_smaller_than_a_part() {
        let parts = plan_segments(10, 64 * 1024 * 1024).unwrap();
        assert_eq!(parts, vec![Segment { index: 0, start: 0, end: 10 }]);
    }

    #[test]
    fn empty_object_has_no_parts() {
        assert!(plan_segments(0, 100).unwrap().is_empty());
    }

    #[test]
    fn zero_part_size_is_rejected() {
        assert!(matches!(plan_segments(10, 0), Err(FetchError::InvalidState(_))));
    }
}
