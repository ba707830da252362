//! Slice extractors
//!
//! Two flavors of lazy, restartable column sequences over a [`Matrix`](crate::Matrix):
//!
//! - [`Columns`]: dynamic length, yields `&[T]` views
//! - [`StaticColumns`]: compile-time length `D`, yields `&[T; D]` reinterpretations
//!   of the contiguous column-major buffer
//!
//! Neither copies data. Both are `Clone`, so re-extracting (or cloning the
//! iterator before consuming it) yields the same slices in the same order.

/// Dynamic column extractor
#[derive(Clone, Debug)]
pub struct Columns<'a, T> {
    data: &'a [T],
    dim: usize,
    batch: usize,
    front: usize,
    back: usize,
}

impl<'a, T> Columns<'a, T> {
    pub(crate) fn new(data: &'a [T], dim: usize, batch: usize) -> Self {
        Self {
            data,
            dim,
            batch,
            front: 0,
            back: batch,
        }
    }

    /// Slice length
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Random access to column `index` of the underlying matrix
    pub fn get(&self, index: usize) -> Option<&'a [T]> {
        if index >= self.batch {
            return None;
        }
        let start = index * self.dim;
        self.data.get(start..start + self.dim)
    }

    fn slice(&self, index: usize) -> &'a [T] {
        &self.data[index * self.dim..(index + 1) * self.dim]
    }
}

impl<'a, T> Iterator for Columns<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let slice = self.slice(self.front);
        self.front += 1;
        Some(slice)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<T> DoubleEndedIterator for Columns<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.slice(self.back))
    }
}

impl<T> ExactSizeIterator for Columns<'_, T> {}

/// Fixed-length column extractor
///
/// Built by [`Matrix::static_columns`](crate::Matrix::static_columns), which
/// has already checked that the matrix leading dimension equals `D`.
#[derive(Clone, Debug)]
pub struct StaticColumns<'a, T, const D: usize> {
    data: &'a [T],
    batch: usize,
    front: usize,
    back: usize,
}

impl<'a, T, const D: usize> StaticColumns<'a, T, D> {
    pub(crate) fn new(data: &'a [T], batch: usize) -> Self {
        Self {
            data,
            batch,
            front: 0,
            back: batch,
        }
    }

    /// Random access to column `index` of the underlying matrix
    pub fn get(&self, index: usize) -> Option<&'a [T; D]> {
        if index >= self.batch {
            return None;
        }
        let start = index * D;
        let slice = self.data.get(start..start + D)?;
        <&[T; D]>::try_from(slice).ok()
    }
}

impl<'a, T, const D: usize> Iterator for StaticColumns<'a, T, D> {
    type Item = &'a [T; D];

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let column = self.get(self.front);
        self.front += 1;
        column
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<T, const D: usize> DoubleEndedIterator for StaticColumns<'_, T, D> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.get(self.back)
    }
}

impl<T, const D: usize> ExactSizeIterator for StaticColumns<'_, T, D> {}
