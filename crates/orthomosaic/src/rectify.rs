//! Pose Rectifier: removes off-nadir camera rotation from a frame's pose,
//! producing the 3x3 projective transform that presents the scene as if
//! viewed straight down.

use nalgebra::Matrix3;

use crate::error::{Error, Result};
use crate::types::{Pose, Transform2D};

/// Smallest determinant magnitude we treat as invertible. Below this the
/// pose is degenerate (e.g. pitch near +/-90 degrees combined with a
/// degenerate roll) and rectification cannot proceed.
const MIN_DETERMINANT: f64 = 1e-9;

/// Derives the rectifying homography for `pose`, per frame `frame_index`
/// (carried only for the `DegeneratePose` error).
///
/// Builds R = Rz(yaw) * (Rx(roll) * Ry(pitch)), zeroes the third column
/// (projecting out the off-plane component) and sets R[2,2] = 1, then
/// returns the inverse of the transpose.
pub fn compute_unrotation_matrix(pose: &Pose, frame_index: usize) -> Result<Transform2D> {
    let a = pose.yaw.to_radians();
    let b = pose.pitch.to_radians();
    let g = pose.roll.to_radians();

    let rz = Matrix3::new(a.cos(), -a.sin(), 0.0, a.sin(), a.cos(), 0.0, 0.0, 0.0, 1.0);
    let ry = Matrix3::new(b.cos(), 0.0, b.sin(), 0.0, 1.0, 0.0, -b.sin(), 0.0, b.cos());
    let rx = Matrix3::new(1.0, 0.0, 0.0, 0.0, g.cos(), -g.sin(), 0.0, g.sin(), g.cos());

    let mut r = rz * (rx * ry);
    r[(0, 2)] = 0.0;
    r[(1, 2)] = 0.0;
    r[(2, 2)] = 1.0;

    let r_trans = r.transpose();
    if r_trans.determinant().abs() < MIN_DETERMINANT {
        return Err(Error::DegeneratePose { frame: frame_index });
    }
    let inv = r_trans
        .try_inverse()
        .ok_or(Error::DegeneratePose { frame: frame_index })?;
    Ok(Transform2D::Projective(inv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn identity_pose() -> Pose {
        Pose { x: 0.0, y: 0.0, z: 0.0, yaw: 0.0, pitch: 0.0, roll: 0.0 }
    }

    #[test]
    fn identity_pose_yields_identity_transform() {
        let t = compute_unrotation_matrix(&identity_pose(), 0).unwrap();
        let m = t.to_matrix3();
        assert_relative_eq!(m, Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn identity_pose_leaves_points_unmoved() {
        let t = compute_unrotation_matrix(&identity_pose(), 0).unwrap();
        let p = Point2::new(37.0, -12.5);
        let q = t.apply(p);
        assert_relative_eq!(p.x, q.x, epsilon = 1e-9);
        assert_relative_eq!(p.y, q.y, epsilon = 1e-9);
    }

    #[test]
    fn pure_yaw_rotation_is_invertible_and_planar() {
        let pose = Pose { yaw: 37.0, ..identity_pose() };
        let t = compute_unrotation_matrix(&pose, 3).unwrap();
        let m = t.to_matrix3();
        assert!(m.try_inverse().is_some());
    }

    #[test]
    fn pitch_at_90_degrees_is_always_degenerate() {
        // With beta = 90 degrees, the top-left 2x2 block of R collapses to
        // zero determinant for every yaw/roll combination.
        let pose = Pose { pitch: 90.0, yaw: 22.0, roll: -61.0, ..identity_pose() };
        let result = compute_unrotation_matrix(&pose, 5);
        assert!(matches!(result, Err(Error::DegeneratePose { frame: 5 })));
    }
}
