use nalgebra::{Matrix2x3, Matrix3, Point2};

/// Immutable 6-tuple pose: position (unused by the core beyond ingestion) and
/// the three rotation angles that drive rectification, in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// A rectangular 8-bit 3-channel (BGR, matching `opencv::core::Mat`'s native
/// layout) raster. A pixel is "background" when all three channels are zero.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Row-major, 3 bytes per pixel.
    pub data: Vec<u8>,
}

impl RasterImage {
    pub fn new_background(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 3],
        }
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, px: [u8; 3]) {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.data[idx..idx + 3].copy_from_slice(&px);
    }

    #[inline]
    pub fn is_background(&self, x: u32, y: u32) -> bool {
        self.pixel(x, y) == [0, 0, 0]
    }

    pub fn corners(&self) -> [Point2<f64>; 4] {
        let (w, h) = (self.width as f64, self.height as f64);
        [
            Point2::new(0.0, 0.0),
            Point2::new(0.0, h),
            Point2::new(w, h),
            Point2::new(w, 0.0),
        ]
    }
}

/// A 2-D transform, either the 4-DOF partial affine path or the 8-DOF
/// projective fallback. A `Projective` is produced only when affine
/// estimation failed.
#[derive(Clone, Copy, Debug)]
pub enum Transform2D {
    Affine(Matrix2x3<f64>),
    Projective(Matrix3<f64>),
}

impl Transform2D {
    /// Embeds the transform as a full 3x3 projective matrix, for composition
    /// with other projective transforms (e.g. the canvas translation `S`).
    pub fn to_matrix3(&self) -> Matrix3<f64> {
        match self {
            Transform2D::Affine(a) => Matrix3::new(
                a[(0, 0)],
                a[(0, 1)],
                a[(0, 2)],
                a[(1, 0)],
                a[(1, 1)],
                a[(1, 2)],
                0.0,
                0.0,
                1.0,
            ),
            Transform2D::Projective(m) => *m,
        }
    }

    /// Applies the transform to a single point, including projective
    /// normalization by the homogeneous coordinate when projective.
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        match self {
            Transform2D::Affine(a) => {
                Point2::new(
                    a[(0, 0)] * p.x + a[(0, 1)] * p.y + a[(0, 2)],
                    a[(1, 0)] * p.x + a[(1, 1)] * p.y + a[(1, 2)],
                )
            }
            Transform2D::Projective(m) => {
                let w = m[(2, 0)] * p.x + m[(2, 1)] * p.y + m[(2, 2)];
                Point2::new(
                    (m[(0, 0)] * p.x + m[(0, 1)] * p.y + m[(0, 2)]) / w,
                    (m[(1, 0)] * p.x + m[(1, 1)] * p.y + m[(1, 2)]) / w,
                )
            }
        }
    }

    pub fn is_affine(&self) -> bool {
        matches!(self, Transform2D::Affine(_))
    }
}

/// Pairs a pose and its original image with the frame's pose-corrected
/// (rectified) image. `rectified` is produced once by the Pose Rectifier and
/// mutated exactly once more when the Assembler re-warps it into mosaic
/// coordinates.
#[derive(Clone, Debug)]
pub struct FrameRecord {
    pub filename: String,
    pub pose: Pose,
    pub original: RasterImage,
    pub rectified: RasterImage,
}
