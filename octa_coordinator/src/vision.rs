//! Vision seam: frame acquisition and 3D reconstruction.
//!
//! The focus loop consumes depth frames and a merged point set; how
//! they are produced (laser, galvo, reconstruction pipeline) stays
//! behind this seam.

use nalgebra::Point3;

use crate::error::VisionError;

/// One acquired depth frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Monotonic sequence number assigned by the capture source.
    pub seq: u64,
    /// Surface points seen by this frame's scan line, pixel units.
    pub points: Vec<Point3<f64>>,
}

/// Seam to the imaging backend.
///
/// Futures are `Send` because the focus executor runs on a spawned task.
pub trait VisionSystem: Clone + Send + Sync + 'static {
    /// Resolve with the next frame whose sequence number exceeds
    /// `last_seq`. Implementations enforce their own minimum inter-frame
    /// gap; callers bound the wait.
    fn next_frame(&self, last_seq: u64) -> impl Future<Output = Result<Frame, VisionError>> + Send;

    /// Merge acquired frames into a single 3D point set, pixel units.
    fn reconstruct(
        &self,
        frames: &[Frame],
    ) -> impl Future<Output = Result<Vec<Point3<f64>>, VisionError>> + Send;

    /// Record a background reference on the imaging backend.
    fn capture_background(&self) -> impl Future<Output = Result<(), VisionError>> + Send;
}
