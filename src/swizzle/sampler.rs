//! Row and column sampling arithmetic, plus background fills.
//!
//! A sample size of `n` keeps every `n`th source coordinate starting at
//! `n / 2`, producing `max(1, dim / n)` output coordinates.

use crate::error::CodecError;

/// Output length of `src` sampled every `sample` coordinates.
#[inline]
pub(crate) fn scaled_dimension(src: usize, sample: usize) -> usize {
    if sample > src { 1 } else { src / sample.max(1) }
}

/// First source coordinate kept when sampling every `sample` coordinates.
#[inline]
pub(crate) fn start_coord(sample: usize) -> usize {
    sample / 2
}

#[inline]
pub(crate) fn dst_coord(src: usize, sample: usize) -> usize {
    src / sample.max(1)
}

/// Whether source coordinate `src` lands in an output of `scaled` coordinates.
#[inline]
pub(crate) fn is_coord_necessary(src: usize, sample: usize, scaled: usize) -> bool {
    if sample <= 1 {
        return src < scaled;
    }
    let start = start_coord(sample);
    if src < start || dst_coord(src, sample) >= scaled {
        return false;
    }
    (src - start) % sample == 0
}

/// Sampling geometry for one decode.
///
/// The requested sample size is clamped per axis to the source dimension,
/// so a tiny image sampled coarsely still keeps its middle coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Sampler {
    pub sample_x: usize,
    pub sample_y: usize,
    pub src_width: usize,
    pub src_height: usize,
}

impl Sampler {
    pub(crate) fn new(sample: u32, src_width: usize, src_height: usize) -> Result<Self, CodecError> {
        if sample == 0 {
            return Err(CodecError::conversion("sample size must be at least 1"));
        }
        let sample = sample as usize;
        Ok(Self {
            sample_x: sample.min(src_width.max(1)),
            sample_y: sample.min(src_height.max(1)),
            src_width,
            src_height,
        })
    }

    pub(crate) fn scaled_width(&self) -> usize {
        scaled_dimension(self.src_width, self.sample_x)
    }

    pub(crate) fn scaled_height(&self) -> usize {
        scaled_dimension(self.src_height, self.sample_y)
    }

    /// Output row for a source row, if the row is kept.
    #[inline]
    pub(crate) fn dst_row(&self, src_y: usize) -> Option<usize> {
        is_coord_necessary(src_y, self.sample_y, self.scaled_height())
            .then(|| dst_coord(src_y, self.sample_y))
    }

    /// Number of output rows taken from source rows before `src_y`.
    pub(crate) fn dst_rows_before(&self, src_y: usize) -> usize {
        let start = start_coord(self.sample_y);
        if src_y <= start {
            return 0;
        }
        ((src_y - start - 1) / self.sample_y + 1).min(self.scaled_height())
    }

    /// Source row feeding output row `dst_y`.
    #[inline]
    pub(crate) fn src_row(&self, dst_y: usize) -> usize {
        start_coord(self.sample_y) + dst_y * self.sample_y
    }

    /// Source column feeding output column `dst_x`.
    #[inline]
    pub(crate) fn src_col(&self, dst_x: usize) -> usize {
        start_coord(self.sample_x) + dst_x * self.sample_x
    }

    /// Output column for a source column, if the column is kept.
    #[inline]
    pub(crate) fn dst_col(&self, src_x: usize) -> Option<usize> {
        is_coord_necessary(src_x, self.sample_x, self.scaled_width())
            .then(|| dst_coord(src_x, self.sample_x))
    }
}

/// Check that `dst` can hold `rows` rows of `row_bytes` at `stride`.
pub(crate) fn check_buffer(
    dst: &[u8],
    stride: usize,
    row_bytes: usize,
    rows: usize,
) -> Result<(), CodecError> {
    if stride < row_bytes {
        return Err(CodecError::BufferTooSmall {
            needed: row_bytes,
            actual: stride,
        });
    }
    let needed = match rows {
        0 => 0,
        n => (n - 1)
            .checked_mul(stride)
            .and_then(|v| v.checked_add(row_bytes))
            .ok_or(CodecError::BufferTooSmall {
                needed: usize::MAX,
                actual: dst.len(),
            })?,
    };
    if dst.len() < needed {
        return Err(CodecError::BufferTooSmall {
            needed,
            actual: dst.len(),
        });
    }
    Ok(())
}

/// Fill `rows` rows of `width` pixels with `value`.
///
/// `value` holds one pixel (one byte for index output, four otherwise).
/// Zero fills of zero-initialized memory are skipped.
pub(crate) fn fill(
    dst: &mut [u8],
    stride: usize,
    width: usize,
    rows: usize,
    value: &[u8],
    zero_initialized: bool,
) {
    if zero_initialized && value.iter().all(|&b| b == 0) {
        return;
    }
    let bpp = value.len();
    let row_bytes = width * bpp;
    for row in dst.chunks_mut(stride).take(rows) {
        let end = row_bytes.min(row.len());
        for px in row[..end].chunks_exact_mut(bpp) {
            px.copy_from_slice(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_dimensions() {
        assert_eq!(scaled_dimension(10, 1), 10);
        assert_eq!(scaled_dimension(10, 3), 3);
        assert_eq!(scaled_dimension(2, 4), 1);
        assert_eq!(start_coord(4), 2);
    }

    #[test]
    fn necessary_coords() {
        // width 10, sample 3 -> keep 1, 4, 7
        let kept: alloc::vec::Vec<usize> =
            (0..10).filter(|&x| is_coord_necessary(x, 3, 3)).collect();
        assert_eq!(kept, [1, 4, 7]);
        let kept: alloc::vec::Vec<usize> =
            (0..2).filter(|&x| is_coord_necessary(x, 2, 1)).collect();
        assert_eq!(kept, [1]);
        assert!(is_coord_necessary(9, 1, 10));
        assert!(!is_coord_necessary(10, 1, 10));
    }

    #[test]
    fn sampler_clamps_to_dimensions() {
        let s = Sampler::new(4, 2, 8).unwrap();
        assert_eq!(s.sample_x, 2);
        assert_eq!(s.scaled_width(), 1);
        assert_eq!(s.dst_col(0), None);
        assert_eq!(s.dst_col(1), Some(0));
        assert_eq!(s.scaled_height(), 2);
        assert_eq!(s.dst_row(2), Some(0));
        assert_eq!(s.dst_row(6), Some(1));
        assert!(Sampler::new(0, 1, 1).is_err());
    }

    #[test]
    fn rows_before() {
        let s = Sampler::new(3, 10, 10).unwrap();
        // keeps rows 1, 4, 7
        assert_eq!(s.dst_rows_before(0), 0);
        assert_eq!(s.dst_rows_before(1), 0);
        assert_eq!(s.dst_rows_before(2), 1);
        assert_eq!(s.dst_rows_before(5), 2);
        assert_eq!(s.dst_rows_before(10), 3);
        assert_eq!(s.src_row(2), 7);
        let s = Sampler::new(1, 4, 4).unwrap();
        assert_eq!(s.dst_rows_before(3), 3);
        assert_eq!(s.dst_rows_before(9), 4);
    }

    #[test]
    fn fill_rows() {
        let mut buf = [9u8; 12];
        fill(&mut buf, 6, 1, 2, &[1, 2, 3, 4], false);
        assert_eq!(buf, [1, 2, 3, 4, 9, 9, 1, 2, 3, 4, 9, 9]);
        let mut buf = [9u8; 4];
        fill(&mut buf, 4, 1, 1, &[0, 0, 0, 0], true);
        assert_eq!(buf, [9; 4]);
    }

    #[test]
    fn buffer_checks() {
        assert!(check_buffer(&[0; 10], 4, 4, 3).is_err());
        assert!(check_buffer(&[0; 12], 4, 4, 3).is_ok());
        assert!(check_buffer(&[0; 11], 5, 4, 3).is_err());
        assert!(check_buffer(&[0; 14], 5, 4, 3).is_ok());
        assert!(check_buffer(&[0; 100], 3, 4, 1).is_err());
    }
}
