use std::ops::{Index, IndexMut};
use std::slice;

/// Dense 3D buffer stored slice by slice, row-major within a slice.
///
/// Element `(x, y, z)` lives at `(z * height + y) * width + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer3<T> {
    voxels: Vec<T>,
    width: usize,
    height: usize,
    depth: usize,
}

impl<T> Buffer3<T> {
    pub fn new(width: usize, height: usize, depth: usize, voxels: Vec<T>) -> Self {
        assert_eq!(
            voxels.len(),
            width * height * depth,
            "voxels length must equal width * height * depth"
        );
        Self {
            voxels,
            width,
            height,
            depth,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of elements in one Z slice.
    #[inline]
    pub fn slice_len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn voxels(&self) -> &[T] {
        &self.voxels
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.voxels.iter()
    }

    /// Borrow Z slice `z` as a flat row-major slice.
    #[inline]
    pub fn slice(&self, z: usize) -> &[T] {
        let len = self.slice_len();
        &self.voxels[z * len..(z + 1) * len]
    }

    #[inline]
    pub fn slice_mut(&mut self, z: usize) -> &mut [T] {
        let len = self.slice_len();
        &mut self.voxels[z * len..(z + 1) * len]
    }

    /// True when `other` has the same width, height and depth.
    #[inline]
    pub fn same_shape<U>(&self, other: &Buffer3<U>) -> bool {
        self.width == other.width && self.height == other.height && self.depth == other.depth
    }

    /// Build a buffer of the same shape by mapping every element.
    pub fn map<U, F>(&self, f: F) -> Buffer3<U>
    where
        F: FnMut(&T) -> U,
    {
        Buffer3 {
            voxels: self.voxels.iter().map(f).collect(),
            width: self.width,
            height: self.height,
            depth: self.depth,
        }
    }
}

impl<T: Default + Clone> Buffer3<T> {
    pub fn new_default(width: usize, height: usize, depth: usize) -> Self {
        Self {
            voxels: vec![T::default(); width * height * depth],
            width,
            height,
            depth,
        }
    }
}

impl<T: Clone> Buffer3<T> {
    pub fn new_filled(width: usize, height: usize, depth: usize, value: T) -> Self {
        Self {
            voxels: vec![value; width * height * depth],
            width,
            height,
            depth,
        }
    }
}

impl<T> Index<(usize, usize, usize)> for Buffer3<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y, z): (usize, usize, usize)) -> &Self::Output {
        &self.voxels[(z * self.height + y) * self.width + x]
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Buffer3<T> {
    #[inline]
    fn index_mut(&mut self, (x, y, z): (usize, usize, usize)) -> &mut Self::Output {
        &mut self.voxels[(z * self.height + y) * self.width + x]
    }
}

impl<T> Index<usize> for Buffer3<T> {
    type Output = T;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        &self.voxels[idx]
    }
}

impl<T> IndexMut<usize> for Buffer3<T> {
    #[inline]
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.voxels[idx]
    }
}

impl<'a, T> IntoIterator for &'a Buffer3<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.voxels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stores_dimensions() {
        let buf = Buffer3::new(3, 2, 2, (0..12).collect::<Vec<i32>>());
        assert_eq!(buf.width(), 3);
        assert_eq!(buf.height(), 2);
        assert_eq!(buf.depth(), 2);
        assert_eq!(buf.len(), 12);
        assert_eq!(buf.slice_len(), 6);
    }

    #[test]
    #[should_panic(expected = "voxels length must equal width * height * depth")]
    fn test_new_panics_on_size_mismatch() {
        Buffer3::new(3, 2, 2, vec![1, 2, 3]);
    }

    #[test]
    fn test_index_layout_is_slice_major() {
        let buf = Buffer3::new(3, 2, 2, (0..12).collect::<Vec<i32>>());
        assert_eq!(buf[(0, 0, 0)], 0);
        assert_eq!(buf[(2, 0, 0)], 2);
        assert_eq!(buf[(0, 1, 0)], 3);
        assert_eq!(buf[(0, 0, 1)], 6);
        assert_eq!(buf[(2, 1, 1)], 11);
        assert_eq!(buf.slice(1), &[6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_slice_mut_writes_only_that_slice() {
        let mut buf: Buffer3<u8> = Buffer3::new_default(2, 2, 3);
        buf.slice_mut(1).fill(7);
        assert!(buf.slice(0).iter().all(|&v| v == 0));
        assert!(buf.slice(1).iter().all(|&v| v == 7));
        assert!(buf.slice(2).iter().all(|&v| v == 0));
    }

    #[test]
    fn test_map_keeps_shape() {
        let buf = Buffer3::new_filled(4, 3, 2, 2.0f32);
        let mapped = buf.map(|&v| (v * 10.0) as u16);
        assert!(buf.same_shape(&mapped));
        assert!(mapped.iter().all(|&v| v == 20));
    }
}
