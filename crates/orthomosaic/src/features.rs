//! Feature Engine: rotation-invariant binary-descriptor detection restricted
//! to the non-zero region of an image, and brute-force ratio-filtered
//! matching between two images.
//!
//! The detector/matcher is kept behind a narrow trait so the rest of the
//! crate depends on a capability contract, not a specific vision library —
//! the same shape as this workspace's `vision_stereo::CameraSource` backend
//! abstraction.

use nalgebra::Point2;

use crate::error::Result;

/// The ratio-test threshold is tighter than the conventional 0.7-0.75
/// because aerial imagery has high self-similarity (repeated ground
/// texture); documented here rather than left as a magic literal.
pub const DEFAULT_RATIO_THRESHOLD: f32 = 0.55;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct RawMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

/// A narrow capability contract: detect oriented keypoints with binary
/// descriptors restricted by a validity mask, and brute-force k-NN match
/// two descriptor sets.
pub trait FeatureBackend {
    type Descriptors;

    /// Detects keypoints and computes descriptors on `gray`, a single-
    /// channel grayscale image, restricted to pixels where `gray`'s value is
    /// greater than zero.
    fn detect_and_compute(&self, gray_with_mask: &GrayMasked) -> Result<(Vec<KeyPoint>, Self::Descriptors)>;

    /// For each `query` descriptor, returns its `k` nearest `train`
    /// descriptors by Hamming distance, closest first.
    fn knn_match(
        &self,
        query: &Self::Descriptors,
        train: &Self::Descriptors,
        k: usize,
    ) -> Result<Vec<Vec<RawMatch>>>;
}

/// A grayscale image paired with the validity mask derived from it
/// (pixel intensity > 0).
pub struct GrayMasked {
    pub width: u32,
    pub height: u32,
    pub gray: Vec<u8>,
}

impl GrayMasked {
    pub fn keypoint_count_hint(&self) -> usize {
        self.gray.iter().filter(|&&v| v > 0).count()
    }
}

/// Applies the Lowe ratio test to raw k=2 matches: accept iff
/// `dist(best) < ratio * dist(second)`. Returns an empty set if either
/// image produced fewer than 2 keypoints.
pub fn ratio_filter(raw: &[Vec<RawMatch>], ratio: f32) -> Vec<RawMatch> {
    raw.iter()
        .filter_map(|pair| match pair.as_slice() {
            [best, second] if best.distance < ratio * second.distance => Some(*best),
            _ => None,
        })
        .collect()
}

/// Runs the full Feature Engine pipeline between `query_image` (matched as
/// "B" in the Assembler's B -> A convention) and `train_image` ("A"),
/// returning the matched point pairs: `(query_points, train_points)`.
pub fn match_points<B: FeatureBackend>(
    backend: &B,
    query_image: &GrayMasked,
    train_image: &GrayMasked,
    ratio_threshold: f32,
) -> Result<(Vec<Point2<f64>>, Vec<Point2<f64>>)> {
    let (query_kp, query_desc) = backend.detect_and_compute(query_image)?;
    let (train_kp, train_desc) = backend.detect_and_compute(train_image)?;

    if query_kp.len() < 2 || train_kp.len() < 2 {
        return Ok((Vec::new(), Vec::new()));
    }

    let raw = backend.knn_match(&query_desc, &train_desc, 2)?;
    let accepted = ratio_filter(&raw, ratio_threshold);

    let mut src = Vec::with_capacity(accepted.len());
    let mut dst = Vec::with_capacity(accepted.len());
    for m in accepted {
        let q = query_kp[m.query_idx];
        let t = train_kp[m.train_idx];
        src.push(Point2::new(q.x as f64, q.y as f64));
        dst.push(Point2::new(t.x as f64, t.y as f64));
    }
    Ok((src, dst))
}

#[cfg(feature = "opencv")]
mod backend {
    use super::*;
    use crate::cv;
    use crate::error::Error;
    use crate::types::RasterImage;
    use opencv::core;
    use opencv::prelude::*;

    /// Converts a color `RasterImage` to the grayscale-plus-mask pair the
    /// Feature Engine operates on.
    pub fn to_gray_masked(image: &RasterImage) -> Result<GrayMasked> {
        let bgr = cv::raster_to_mat(image)?;
        let mut gray = core::Mat::default();
        opencv::imgproc::cvt_color(&bgr, &mut gray, opencv::imgproc::COLOR_BGR2GRAY, 0)
            .map_err(Error::from)?;
        Ok(GrayMasked {
            width: image.width,
            height: image.height,
            gray: gray.data_bytes().map_err(Error::from)?.to_vec(),
        })
    }

    /// ORB detector + brute-force Hamming matcher, the direct analogue of
    /// the original `cv2.ORB_create()` / `cv2.BFMatcher()` pairing.
    pub struct OrbBackend {
        orb: core::Ptr<opencv::features2d::ORB>,
        matcher: core::Ptr<opencv::features2d::BFMatcher>,
    }

    impl OrbBackend {
        pub fn new() -> Result<Self> {
            let orb = opencv::features2d::ORB::create_def().map_err(Error::from)?;
            let matcher =
                opencv::features2d::BFMatcher::create(core::NORM_HAMMING, false).map_err(Error::from)?;
            Ok(Self { orb, matcher })
        }
    }

    impl FeatureBackend for OrbBackend {
        type Descriptors = core::Mat;

        fn detect_and_compute(
            &self,
            gray_with_mask: &GrayMasked,
        ) -> Result<(Vec<KeyPoint>, core::Mat)> {
            let flat = core::Mat::from_slice(&gray_with_mask.gray).map_err(Error::from)?;
            let gray = flat
                .reshape(1, gray_with_mask.height as i32)
                .map_err(Error::from)?;
            let mut mask = core::Mat::default();
            opencv::imgproc::threshold(
                &gray,
                &mut mask,
                0.0,
                255.0,
                opencv::imgproc::THRESH_BINARY,
            )
            .map_err(Error::from)?;

            let mut keypoints = core::Vector::<core::KeyPoint>::new();
            let mut descriptors = core::Mat::default();
            {
                use opencv::features2d::Feature2DTrait;
                self.orb
                    .detect_and_compute(&gray, &mask, &mut keypoints, &mut descriptors, false)
                    .map_err(Error::from)?;
            }

            let points = keypoints
                .iter()
                .map(|kp| {
                    let pt = kp.pt();
                    KeyPoint { x: pt.x, y: pt.y }
                })
                .collect();
            Ok((points, descriptors))
        }

        fn knn_match(
            &self,
            query: &core::Mat,
            train: &core::Mat,
            k: usize,
        ) -> Result<Vec<Vec<RawMatch>>> {
            use opencv::features2d::DescriptorMatcherTraitConst;
            let mut matches = core::Vector::<core::Vector<core::DMatch>>::new();
            self.matcher
                .knn_train_match(query, train, &mut matches, k as i32, &core::Mat::default(), false)
                .map_err(Error::from)?;
            Ok(matches
                .iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|m| RawMatch {
                            query_idx: m.query_idx as usize,
                            train_idx: m.train_idx as usize,
                            distance: m.distance,
                        })
                        .collect()
                })
                .collect())
        }
    }
}

#[cfg(feature = "opencv")]
pub use backend::{to_gray_masked, OrbBackend};

#[cfg(test)]
mod tests {
    use super::*;

    /// A deterministic in-memory backend for the pure-math property tests:
    /// keypoints are the nonzero pixel coordinates, descriptors are those
    /// same coordinates encoded as bytes, so identical images always
    /// self-match.
    struct IdentityBackend;

    impl FeatureBackend for IdentityBackend {
        type Descriptors = Vec<[u8; 2]>;

        fn detect_and_compute(
            &self,
            gray_with_mask: &GrayMasked,
        ) -> Result<(Vec<KeyPoint>, Vec<[u8; 2]>)> {
            let mut kps = Vec::new();
            let mut descs = Vec::new();
            for y in 0..gray_with_mask.height {
                for x in 0..gray_with_mask.width {
                    let idx = (y * gray_with_mask.width + x) as usize;
                    if gray_with_mask.gray[idx] > 0 {
                        kps.push(KeyPoint { x: x as f32, y: y as f32 });
                        descs.push([x as u8, y as u8]);
                    }
                }
            }
            Ok((kps, descs))
        }

        fn knn_match(
            &self,
            query: &Vec<[u8; 2]>,
            train: &Vec<[u8; 2]>,
            k: usize,
        ) -> Result<Vec<Vec<RawMatch>>> {
            let mut out = Vec::with_capacity(query.len());
            for (qi, q) in query.iter().enumerate() {
                let mut dists: Vec<RawMatch> = train
                    .iter()
                    .enumerate()
                    .map(|(ti, t)| RawMatch {
                        query_idx: qi,
                        train_idx: ti,
                        distance: ((q[0] as i32 - t[0] as i32).pow(2)
                            + (q[1] as i32 - t[1] as i32).pow(2)) as f32,
                    })
                    .collect();
                dists.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
                dists.truncate(k);
                out.push(dists);
            }
            Ok(out)
        }
    }

    fn grid_image(w: u32, h: u32) -> GrayMasked {
        let mut gray = vec![0u8; (w * h) as usize];
        for y in 0..h {
            for x in 0..w {
                if (x + y) % 5 == 0 {
                    gray[(y * w + x) as usize] = 200;
                }
            }
        }
        GrayMasked { width: w, height: h, gray }
    }

    #[test]
    fn self_match_is_index_identity() {
        let img = grid_image(20, 20);
        let backend = IdentityBackend;
        let (query_kp, query_desc) = backend.detect_and_compute(&img).unwrap();
        let (_, train_desc) = backend.detect_and_compute(&img).unwrap();
        let raw = backend.knn_match(&query_desc, &train_desc, 2).unwrap();
        let accepted = ratio_filter(&raw, DEFAULT_RATIO_THRESHOLD);
        assert!(!accepted.is_empty());
        for m in &accepted {
            assert_eq!(m.query_idx, m.train_idx);
        }
        assert_eq!(accepted.len(), query_kp.len());
    }

    #[test]
    fn fewer_than_two_keypoints_yields_no_matches() {
        let sparse = GrayMasked { width: 4, height: 4, gray: vec![0u8; 16] };
        let backend = IdentityBackend;
        let (src, dst) = match_points(&backend, &sparse, &sparse, DEFAULT_RATIO_THRESHOLD).unwrap();
        assert!(src.is_empty());
        assert!(dst.is_empty());
    }
}
