//! Positional access to a 2-D NumPy array of vectors.
//!
//! The file is memory-mapped and viewed in place, so a load only pulls in the
//! pages backing the rows of the batch currently being upserted.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use ndarray::ArrayView2;
use ndarray_npy::ViewNpyExt;

use crate::error::{Error, Result};

/// A memory-mapped `.npy` file holding one vector per row
pub struct VectorArray {
    path: PathBuf,
    mmap: Mmap,
}

impl VectorArray {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        // SAFETY: the benchmark only reads the mapping; the file must not be
        // truncated while a run is in progress.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { path, mmap })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the header and borrow the data as `f32` or `f64` rows
    pub fn view(&self) -> Result<VectorView<'_>> {
        let bytes: &[u8] = &self.mmap[..];
        match ArrayView2::<f32>::view_npy(bytes) {
            Ok(view) => Ok(VectorView::F32(view)),
            Err(f32_err) => match ArrayView2::<f64>::view_npy(bytes) {
                Ok(view) => Ok(VectorView::F64(view)),
                Err(_) => Err(Error::VectorFile {
                    path: self.path.clone(),
                    reason: f32_err.to_string(),
                }),
            },
        }
    }
}

/// Borrowed view over the mapped array
pub enum VectorView<'a> {
    F32(ArrayView2<'a, f32>),
    F64(ArrayView2<'a, f64>),
}

impl VectorView<'_> {
    /// Number of vectors
    pub fn rows(&self) -> usize {
        match self {
            VectorView::F32(v) => v.nrows(),
            VectorView::F64(v) => v.nrows(),
        }
    }

    /// Length of each vector
    pub fn dimension(&self) -> usize {
        match self {
            VectorView::F32(v) => v.ncols(),
            VectorView::F64(v) => v.ncols(),
        }
    }

    /// Copy rows `start..start + len` out of the mapping
    pub fn slice(&self, start: usize, len: usize) -> Result<Vec<Vec<f32>>> {
        let end = start + len;
        let rows = self.rows();
        if end > rows {
            return Err(Error::VectorOutOfRange { start, end, rows });
        }

        let vectors = match self {
            VectorView::F32(v) => (start..end).map(|i| v.row(i).to_vec()).collect(),
            VectorView::F64(v) => (start..end)
                .map(|i| v.row(i).iter().map(|&x| x as f32).collect())
                .collect(),
        };
        Ok(vectors)
    }
}
