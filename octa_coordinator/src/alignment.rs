//! Surface alignment math for the focus loop.
//!
//! From a reconstructed point set the loop needs three things: the
//! oriented bounding box of the imaged surface patch, the box tilt as
//! roll/pitch/yaw in the probe frame, and the depth offset between the
//! configured target height and the box center. The box rotation coming
//! out of PCA is ambiguous (any axis permutation and sign is an equally
//! valid eigenbasis), so it is aligned to the probe frame first; without
//! that step a flat surface could read as a 90-degree tilt.

use nalgebra::{Matrix3, Point3, Rotation3, UnitQuaternion, Vector3};

use crate::error::VisionError;

/// Oriented bounding box of a point set.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedBox {
    /// Box center in cloud (pixel) coordinates.
    pub center: Point3<f64>,
    /// Box axes, aligned to the probe frame.
    pub rotation: Rotation3<f64>,
    /// Half extent along each box axis.
    pub half_extents: Vector3<f64>,
}

/// One measurement of the imaged surface relative to the probe.
///
/// Angles are radians, already remapped into the probe frame; `dz` is
/// meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentSample {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub center: Point3<f64>,
    pub dz: f64,
}

impl AlignmentSample {
    /// Corrective rotation to compose onto the current orientation.
    pub fn correction_rotation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw)
    }
}

/// Fit the minimal oriented bounding box of `points` by PCA.
pub fn oriented_bounding_box(points: &[Point3<f64>]) -> Result<OrientedBox, VisionError> {
    if points.len() < 3 {
        return Err(VisionError::DegenerateCloud {
            points: points.len(),
        });
    }

    let n = points.len() as f64;
    let centroid = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;

    let mut covariance = Matrix3::zeros();
    for p in points {
        let d = p.coords - centroid;
        covariance += d * d.transpose();
    }
    covariance /= n;

    let eigen = covariance.symmetric_eigen();
    let axes = align_to_axes(&eigen.eigenvectors);

    // Project onto the box axes to find the extents, then lift the box
    // center back into cloud coordinates.
    let mut min = Vector3::repeat(f64::INFINITY);
    let mut max = Vector3::repeat(f64::NEG_INFINITY);
    for p in points {
        let local = axes.transpose() * (p.coords - centroid);
        min = min.inf(&local);
        max = max.sup(&local);
    }
    let mid = (min + max) * 0.5;

    Ok(OrientedBox {
        center: Point3::from(centroid + axes * mid),
        rotation: Rotation3::from_matrix_unchecked(axes),
        half_extents: (max - min) * 0.5,
    })
}

/// Resolve the eigenbasis ambiguity: permute and flip the columns so
/// each box axis points along the nearest probe-frame axis, keeping the
/// result right-handed.
fn align_to_axes(basis: &Matrix3<f64>) -> Matrix3<f64> {
    let mut used = [false; 3];
    let mut columns = [Vector3::zeros(); 3];

    for axis in 0..2 {
        let mut best = 0;
        let mut best_component = f64::NEG_INFINITY;
        for (j, flag) in used.iter().enumerate() {
            if *flag {
                continue;
            }
            let component = basis.column(j)[axis].abs();
            if component > best_component {
                best_component = component;
                best = j;
            }
        }
        used[best] = true;
        let mut column = basis.column(best).into_owned();
        if column[axis] < 0.0 {
            column = -column;
        }
        columns[axis] = column;
    }
    columns[2] = columns[0].cross(&columns[1]);

    Matrix3::from_columns(&columns)
}

/// Measure the surface tilt and depth offset of a reconstructed cloud.
///
/// The probe is mounted rotated a quarter turn around the optical axis
/// relative to the scan frame, so the extracted roll/pitch swap with a
/// sign flip before they mean anything to the motion side.
pub fn measure(
    points: &[Point3<f64>],
    z_height_px: f64,
    px_per_mm: f64,
) -> Result<AlignmentSample, VisionError> {
    let obb = oriented_bounding_box(points)?;
    let (raw_roll, raw_pitch, raw_yaw) = obb.rotation.euler_angles();

    Ok(AlignmentSample {
        roll: -raw_pitch,
        pitch: raw_roll,
        yaw: raw_yaw,
        center: obb.center,
        dz: (z_height_px - obb.center.z) / (px_per_mm * 1000.0),
    })
}

/// Angle acceptance: both tilt components strictly inside the tolerance.
pub fn angle_within_tolerance(roll: f64, pitch: f64, tolerance_deg: f64) -> bool {
    let bound = tolerance_deg.to_radians();
    roll.abs() < bound && pitch.abs() < bound
}

/// Height acceptance: depth offset strictly inside the tolerance.
pub fn height_within_tolerance(dz_m: f64, z_tolerance_mm: f64) -> bool {
    dz_m.abs() < z_tolerance_mm / 1000.0
}
