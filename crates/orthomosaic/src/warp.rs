//! Padded Warper: applies a 3x3 transform to an image while expanding the
//! output canvas so no warped content is clipped.

use nalgebra::{Matrix3, Point2};

use crate::types::{RasterImage, Transform2D};

/// The outcome of computing a padded canvas for one or more sets of
/// (already-transformed) corner points: the translation that brings the
/// minimum corner to the origin, and the resulting canvas size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasPlan {
    pub translation: Matrix3<f64>,
    pub width: u32,
    pub height: u32,
}

/// Component-wise min/max over `points`, rounded outward: floor for the
/// minimum, ceil for the maximum. Deliberately not a cast-based truncation,
/// which would bias negative minima toward zero.
fn bounding_box(points: impl IntoIterator<Item = Point2<f64>>) -> (f64, f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut y_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for p in points {
        x_min = x_min.min(p.x);
        y_min = y_min.min(p.y);
        x_max = x_max.max(p.x);
        y_max = y_max.max(p.y);
    }
    (x_min.floor(), y_min.floor(), x_max.ceil(), y_max.ceil())
}

/// Computes the canvas plan that contains every point in `points`.
pub fn canvas_plan(points: impl IntoIterator<Item = Point2<f64>>) -> CanvasPlan {
    let (x_min, y_min, x_max, y_max) = bounding_box(points);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let (width, height) = ((x_max - x_min) as u32, (y_max - y_min) as u32);
    let translation = Matrix3::new(1.0, 0.0, -x_min, 0.0, 1.0, -y_min, 0.0, 0.0, 1.0);
    CanvasPlan { translation, width, height }
}

/// Computes the padded-canvas plan for warping `image` by `transform`: the
/// four image corners under projective application of `transform`.
pub fn padded_canvas_for(image: &RasterImage, transform: &Transform2D) -> CanvasPlan {
    canvas_plan(image.corners().into_iter().map(|c| transform.apply(c)))
}

#[cfg(feature = "opencv")]
mod backend {
    use super::*;
    use crate::cv;
    use crate::error::Result;
    use opencv::core;
    use opencv::prelude::*;

    /// Warps `image` by `transform`, expanding the canvas so nothing is
    /// clipped. Returns the warped image and the translation `S` used, so
    /// callers can re-express other points in the new canvas.
    pub fn warp_with_padding(
        image: &RasterImage,
        transform: &Transform2D,
    ) -> Result<(RasterImage, Matrix3<f64>)> {
        let plan = padded_canvas_for(image, transform);
        let full = plan.translation * transform.to_matrix3();
        let src = cv::raster_to_mat(image)?;
        let full_mat = cv::matrix3_to_mat(&full)?;
        let mut dst = core::Mat::default();
        opencv::imgproc::warp_perspective(
            &src,
            &mut dst,
            &full_mat,
            core::Size::new(plan.width as i32, plan.height as i32),
            opencv::imgproc::INTER_LINEAR,
            core::BORDER_CONSTANT,
            core::Scalar::all(0.0),
        )?;
        Ok((cv::mat_to_raster(&dst)?, plan.translation))
    }

    /// Warps `mosaic` by the pure-translation/projective `s` into a canvas
    /// of the given size (Assembler step 6, placing `M` into `M'`).
    pub fn warp_projective_into(
        image: &RasterImage,
        s: &Matrix3<f64>,
        width: u32,
        height: u32,
    ) -> Result<RasterImage> {
        let src = cv::raster_to_mat(image)?;
        let s_mat = cv::matrix3_to_mat(s)?;
        let mut dst = core::Mat::default();
        opencv::imgproc::warp_perspective(
            &src,
            &mut dst,
            &s_mat,
            core::Size::new(width as i32, height as i32),
            opencv::imgproc::INTER_LINEAR,
            core::BORDER_CONSTANT,
            core::Scalar::all(0.0),
        )?;
        cv::mat_to_raster(&dst)
    }

    /// Warps `image` by the affine 2x3 transform `a` into a canvas of the
    /// given size (the second half of Assembler step 6's affine path).
    pub fn warp_affine_into(
        image: &RasterImage,
        a: &nalgebra::Matrix2x3<f64>,
        width: u32,
        height: u32,
    ) -> Result<RasterImage> {
        let src = cv::raster_to_mat(image)?;
        let a_mat = cv::matrix2x3_to_mat(a)?;
        let mut dst = core::Mat::default();
        opencv::imgproc::warp_affine(
            &src,
            &mut dst,
            &a_mat,
            core::Size::new(width as i32, height as i32),
            opencv::imgproc::INTER_LINEAR,
            core::BORDER_CONSTANT,
            core::Scalar::all(0.0),
        )?;
        cv::mat_to_raster(&dst)
    }
}

#[cfg(feature = "opencv")]
pub use backend::{warp_affine_into, warp_projective_into, warp_with_padding};

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    #[test]
    fn identity_transform_reproduces_image_size() {
        let img = RasterImage::new_background(100, 50);
        let t = Transform2D::Projective(Matrix3::identity());
        let plan = padded_canvas_for(&img, &t);
        assert_eq!(plan.width, 100);
        assert_eq!(plan.height, 50);
        assert_eq!(plan.translation, Matrix3::identity());
    }

    #[test]
    fn translation_only_transform_grows_canvas_by_the_shift() {
        let img = RasterImage::new_background(100, 50);
        // Pure +30,+10 translation.
        let m = Matrix3::new(1.0, 0.0, 30.0, 0.0, 1.0, 10.0, 0.0, 0.0, 1.0);
        let t = Transform2D::Projective(m);
        let plan = padded_canvas_for(&img, &t);
        assert_eq!(plan.width, 130);
        assert_eq!(plan.height, 60);
    }

    #[test]
    fn no_corner_maps_outside_the_canvas() {
        let img = RasterImage::new_background(64, 48);
        let m = Matrix3::new(1.2, 0.1, -15.0, -0.05, 0.9, 22.0, 0.0001, 0.0002, 1.0);
        let t = Transform2D::Projective(m);
        let plan = padded_canvas_for(&img, &t);
        for corner in img.corners() {
            let w = t.apply(corner);
            let local_x = w.x + plan.translation[(0, 2)];
            let local_y = w.y + plan.translation[(1, 2)];
            assert!(local_x >= -1e-6 && local_x <= plan.width as f64 + 1e-6);
            assert!(local_y >= -1e-6 && local_y <= plan.height as f64 + 1e-6);
        }
    }

    #[test]
    fn canvas_monotonicity_holds_when_concatenating_corner_sets() {
        let a = RasterImage::new_background(100, 100);
        let b = RasterImage::new_background(100, 100);
        let t = Transform2D::Projective(Matrix3::new(
            1.0, 0.0, 40.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0,
        ));
        let base_plan = canvas_plan(a.corners());
        let combined = canvas_plan(
            a.corners()
                .into_iter()
                .chain(b.corners().into_iter().map(|c| t.apply(c))),
        );
        assert!(combined.width >= base_plan.width);
        assert!(combined.height >= base_plan.height);
    }
}
