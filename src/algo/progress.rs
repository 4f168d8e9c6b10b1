//! Progress reporting for decimation runs.
//!
//! [`Decimator::compute_with_progress`](crate::algo::decimate::Decimator::compute_with_progress)
//! calls the reporter once per pass with the number of triangles removed so
//! far and the number it could remove at most.
//!
//! # Example
//!
//! ```
//! use meshcollapse::algo::progress::Progress;
//!
//! let progress = Progress::new(|removed, removable, message| {
//!     println!("[{}/{}] {}", removed, removable, message);
//! });
//! progress.report(3, 10, "pass 1: 7 triangles");
//! ```

/// A progress callback receiving `(current, total, message)`.
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Wrap a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// A reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}
