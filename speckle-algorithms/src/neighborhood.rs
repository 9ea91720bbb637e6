//! Index arithmetic shared by the volume algorithms.

use speckle_core::Connectivity;

/// Neighbor enumeration for a fixed volume shape.
#[derive(Debug, Clone)]
pub(crate) struct Neighborhood {
    shape: [usize; 3],
    offsets: Vec<[isize; 3]>,
}

impl Neighborhood {
    pub(crate) fn new(shape: [usize; 3], connectivity: Connectivity) -> Self {
        Self {
            shape,
            offsets: connectivity.offsets(),
        }
    }

    /// Neighborhood restricted to offsets that precede the origin in
    /// raster order.
    pub(crate) fn backward(shape: [usize; 3], connectivity: Connectivity) -> Self {
        Self {
            shape,
            offsets: connectivity.backward_offsets(),
        }
    }

    /// In-bounds neighbors of `index`.
    pub(crate) fn around(&self, index: [usize; 3]) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.offsets
            .iter()
            .filter_map(move |offset| shift(index, *offset, self.shape))
    }
}

/// Applies `offset` to `index`, returning `None` outside `shape`.
#[inline]
pub(crate) fn shift(index: [usize; 3], offset: [isize; 3], shape: [usize; 3]) -> Option<[usize; 3]> {
    let mut out = [0usize; 3];
    for axis in 0..3 {
        let moved = index[axis].checked_add_signed(offset[axis])?;
        if moved >= shape[axis] {
            return None;
        }
        out[axis] = moved;
    }
    Some(out)
}

/// Half-sample symmetric boundary (`d c b a | a b c d | d c b a`).
#[inline]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub(crate) fn reflect(position: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let wrapped = position.rem_euclid(period);
    if wrapped >= len {
        (period - 1 - wrapped) as usize
    } else {
        wrapped as usize
    }
}

/// True when `index` lies on the outer face of the volume.
#[inline]
pub(crate) fn on_border(index: [usize; 3], shape: [usize; 3]) -> bool {
    (0..3).any(|axis| index[axis] == 0 || index[axis] + 1 == shape[axis])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect_boundary() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(2, 4), 2);
        // Offsets wider than the axis keep folding.
        assert_eq!(reflect(9, 4), 1);
        assert_eq!(reflect(0, 1), 0);
        assert_eq!(reflect(-7, 1), 0);
    }

    #[test]
    fn test_corner_neighbors() {
        let hood = Neighborhood::new([3, 3, 3], Connectivity::Full);
        assert_eq!(hood.around([0, 0, 0]).count(), 7);
        assert_eq!(hood.around([1, 1, 1]).count(), 26);
        let hood = Neighborhood::new([3, 3, 3], Connectivity::Face);
        assert_eq!(hood.around([0, 0, 0]).count(), 3);
    }

    #[test]
    fn test_on_border() {
        assert!(on_border([0, 1, 1], [3, 3, 3]));
        assert!(on_border([1, 1, 2], [3, 3, 3]));
        assert!(!on_border([1, 1, 1], [3, 3, 3]));
    }
}
