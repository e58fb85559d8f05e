//! Mask-based composition rule: a mosaic pixel that held content before a
//! combine still holds content after, unless the newly placed frame covers
//! that pixel with non-background data.
//!
//! The mask is a float multiply (`mosaic * mask + new_frame`) with `mask`
//! either 0 or 1; expressed here as a direct per-pixel select, which is the
//! same rule without the intermediate float buffer.

use crate::error::{Error, Result};
use crate::types::RasterImage;

/// Composites `placed_frame` onto `mosaic` (both already the same size,
/// i.e. already warped into the shared canvas): wherever `placed_frame` has
/// content, it wins; elsewhere the mosaic pixel survives.
pub fn composite(mosaic: &RasterImage, placed_frame: &RasterImage) -> Result<RasterImage> {
    if mosaic.width != placed_frame.width || mosaic.height != placed_frame.height {
        return Err(Error::SizeMismatch {
            mosaic_w: mosaic.width,
            mosaic_h: mosaic.height,
            frame_w: placed_frame.width,
            frame_h: placed_frame.height,
        });
    }

    let mut out = RasterImage::new_background(mosaic.width, mosaic.height);
    for y in 0..mosaic.height {
        for x in 0..mosaic.width {
            let b = placed_frame.pixel(x, y);
            if b == [0, 0, 0] {
                out.set_pixel(x, y, mosaic.pixel(x, y));
            } else {
                out.set_pixel(x, y, b);
            }
        }
    }
    Ok(out)
}
