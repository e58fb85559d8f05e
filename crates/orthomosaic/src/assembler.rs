//! Mosaic Assembler: the incremental pairwise registration-and-blending loop
//! that turns a pose-ordered sequence of frames into one mosaic.

#[cfg(feature = "opencv")]
mod imp {
    use std::path::Path;

    use tracing::{debug, info, warn};

    use crate::compose::composite;
    use crate::config::{AssemblerConfig, FailurePolicy};
    use crate::cv;
    use crate::error::{Error, Result};
    use crate::features::{self, OrbBackend};
    use crate::posefile::PoseRecord;
    use crate::rectify;
    use crate::transform;
    use crate::types::{FrameRecord, RasterImage, Transform2D};
    use crate::warp;

    /// Owns the ORB/BFMatcher feature backend and the run's configuration.
    pub struct Assembler {
        config: AssemblerConfig,
        backend: OrbBackend,
    }

    impl Assembler {
        pub fn new(config: AssemblerConfig) -> Result<Self> {
            Ok(Self { backend: OrbBackend::new()?, config })
        }

        /// Reads each referenced image from `image_dir`, downsamples it per
        /// `config.downsample_factor`, and rectifies it per its pose, in
        /// pose-file order.
        pub fn ingest(&self, records: &[PoseRecord], image_dir: &Path) -> Result<Vec<FrameRecord>> {
            records
                .iter()
                .enumerate()
                .map(|(i, record)| {
                    let path = image_dir.join(&record.filename);
                    let original = cv::read_image(&path)?;
                    let decimated = downsample(&original, self.config.downsample_factor);
                    let rectifying = rectify::compute_unrotation_matrix(&record.pose, i)?;
                    let (rectified, _) = warp::warp_with_padding(&decimated, &rectifying)?;
                    Ok(FrameRecord {
                        filename: record.filename.clone(),
                        pose: record.pose,
                        original: decimated,
                        rectified,
                    })
                })
                .collect()
        }

        /// Runs the main incremental loop over already-rectified `frames`,
        /// persisting the intermediate mosaic after every successful
        /// combine, and returns the final mosaic.
        pub fn assemble(&self, mut frames: Vec<FrameRecord>) -> Result<RasterImage> {
            let first = frames.first().ok_or_else(|| Error::Io("no frames to assemble".into()))?;
            let mut mosaic = first.rectified.clone();
            cv::write_image(&self.config.intermediate_path, &mosaic)?;
            info!(frame = 0, width = mosaic.width, height = mosaic.height, "initialized mosaic");

            let mut i = 1;
            while i < frames.len() {
                match self.combine(&mosaic, &frames[i - 1].rectified, &frames[i].rectified, i) {
                    Ok((new_mosaic, placed_b)) => {
                        frames[i].rectified = placed_b;
                        cv::write_image(&self.config.intermediate_path, &new_mosaic)?;
                        info!(
                            frame = i,
                            width = new_mosaic.width,
                            height = new_mosaic.height,
                            "combined frame into mosaic"
                        );
                        mosaic = new_mosaic;
                        i += 1;
                    }
                    Err(e) => match self.config.on_alignment_failure {
                        FailurePolicy::Halt => {
                            warn!(frame = i, error = %e, "halting on alignment failure");
                            return Err(Error::AlignmentFailed(i));
                        }
                        FailurePolicy::Skip => {
                            warn!(frame = i, error = %e, "skipping frame after alignment failure");
                            frames[i].rectified = frames[i - 1].rectified.clone();
                            i += 1;
                        }
                    },
                }
            }
            Ok(mosaic)
        }

        /// One pairwise combine step: matches `b` against `a` (the previous
        /// frame, already in mosaic coordinates), solves the transform that
        /// maps `b` onto `a`, expands the canvas to hold both, and
        /// composites. Returns the new mosaic and `b` re-warped into the new
        /// canvas, since the caller needs the latter as the next iteration's
        /// "previous frame".
        fn combine(
            &self,
            mosaic: &RasterImage,
            a: &RasterImage,
            b: &RasterImage,
            frame_index: usize,
        ) -> Result<(RasterImage, RasterImage)> {
            let gray_a = features::to_gray_masked(a)?;
            let gray_b = features::to_gray_masked(b)?;
            let (src, dst) =
                features::match_points(&self.backend, &gray_b, &gray_a, self.config.ratio_threshold)?;

            if src.len() < transform::MIN_AFFINE_POINTS {
                return Err(Error::InsufficientMatches {
                    frame: frame_index,
                    found: src.len(),
                    needed: transform::MIN_AFFINE_POINTS,
                });
            }

            let t = transform::solve(&src, &dst, frame_index)?;
            debug!(
                frame = frame_index,
                matches = src.len(),
                transform = if t.is_affine() { "affine" } else { "projective" },
                "solved pairwise transform"
            );

            let a_corners = a.corners().into_iter();
            let b_corners = b.corners().into_iter().map(|c| t.apply(c));
            let plan = warp::canvas_plan(a_corners.chain(b_corners));

            let m_prime = warp::warp_projective_into(mosaic, &plan.translation, plan.width, plan.height)?;
            let b_prime = match &t {
                Transform2D::Projective(h) => {
                    let full = plan.translation * *h;
                    warp::warp_projective_into(b, &full, plan.width, plan.height)?
                }
                Transform2D::Affine(a_t) => {
                    let staged = warp::warp_projective_into(b, &plan.translation, plan.width, plan.height)?;
                    warp::warp_affine_into(&staged, a_t, plan.width, plan.height)?
                }
            };

            let output = composite(&m_prime, &b_prime)?;
            Ok((output, b_prime))
        }
    }

    /// Decimates both dimensions by `factor` via nearest-neighbor sampling,
    /// a performance knob with no effect on correctness. `factor <= 1` is a
    /// no-op.
    fn downsample(image: &RasterImage, factor: u32) -> RasterImage {
        if factor <= 1 {
            return image.clone();
        }
        let new_w = (image.width / factor).max(1);
        let new_h = (image.height / factor).max(1);
        let mut out = RasterImage::new_background(new_w, new_h);
        for y in 0..new_h {
            for x in 0..new_w {
                out.set_pixel(x, y, image.pixel(x * factor, y * factor));
            }
        }
        out
    }
}

#[cfg(feature = "opencv")]
pub use imp::Assembler;
