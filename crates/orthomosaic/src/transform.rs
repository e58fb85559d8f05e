//! Transform Solver: robust partial-affine estimation with a projective
//! fallback.

use nalgebra::Point2;

use crate::error::{Error, Result};
use crate::types::Transform2D;

pub const MIN_AFFINE_POINTS: usize = 3;
pub const MIN_PROJECTIVE_POINTS: usize = 4;

#[cfg(feature = "opencv")]
mod backend {
    use super::*;
    use crate::cv;
    use opencv::core;
    use opencv::prelude::*;

    fn to_point2f_vec(points: &[Point2<f64>]) -> core::Vector<core::Point2f> {
        points
            .iter()
            .map(|p| core::Point2f::new(p.x as f32, p.y as f32))
            .collect()
    }

    /// Estimates a 2-D partial affine transform (translation + uniform
    /// scale + rotation, 4 DOF) with RANSAC outlier rejection. `src` maps to
    /// `dst`. Returns `Ok(None)` when OpenCV's RANSAC could not find a
    /// model (the "try homography instead" branch), distinct from a
    /// hard error.
    fn estimate_affine(
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
    ) -> Result<Option<nalgebra::Matrix2x3<f64>>> {
        if src.len() < MIN_AFFINE_POINTS {
            return Ok(None);
        }
        let src_v = to_point2f_vec(src);
        let dst_v = to_point2f_vec(dst);
        let mut inliers = core::Mat::default();
        let result = opencv::calib3d::estimate_affine_partial_2d(
            &src_v,
            &dst_v,
            &mut inliers,
            opencv::calib3d::RANSAC,
            3.0,
            2000,
            0.99,
            10,
        )
        .map_err(Error::from)?;
        if result.empty() {
            return Ok(None);
        }
        Ok(Some(cv::mat_to_matrix2x3(&result)?))
    }

    /// Estimates a full 8-DOF homography with RANSAC. `src` maps to `dst`.
    fn estimate_homography(
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
    ) -> Result<Option<nalgebra::Matrix3<f64>>> {
        if src.len() < MIN_PROJECTIVE_POINTS {
            return Ok(None);
        }
        let src_v = to_point2f_vec(src);
        let dst_v = to_point2f_vec(dst);
        let mut mask = core::Mat::default();
        let result = opencv::calib3d::find_homography(
            &src_v,
            &dst_v,
            &mut mask,
            opencv::calib3d::RANSAC,
            3.0,
        )
        .map_err(Error::from)?;
        if result.empty() {
            return Ok(None);
        }
        Ok(Some(cv::mat_to_matrix3(&result)?))
    }

    /// Tries the affine path first, falling back to projective on failure.
    /// `frame_index` is carried only for the `TransformUnavailable` error.
    pub fn solve(
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
        frame_index: usize,
    ) -> Result<Transform2D> {
        if let Some(a) = estimate_affine(src, dst)? {
            return Ok(Transform2D::Affine(a));
        }
        if let Some(h) = estimate_homography(src, dst)? {
            return Ok(Transform2D::Projective(h));
        }
        Err(Error::TransformUnavailable { frame: frame_index })
    }
}

#[cfg(feature = "opencv")]
pub use backend::solve;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affine_requires_at_least_three_points() {
        let src = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
        assert!(src.len() < MIN_AFFINE_POINTS);
    }

    #[test]
    fn projective_requires_at_least_four_points() {
        let src = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(src.len() < MIN_PROJECTIVE_POINTS);
    }
}
