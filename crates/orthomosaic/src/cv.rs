//! Thin conversions between the crate's plain [`RasterImage`]/matrix types
//! and `opencv::core::Mat`, isolated here so the rest of the crate only
//! speaks in its own types. Mirrors the from-slice/reshape idiom already
//! used by this workspace's vision backend for BGR8 buffers.

use nalgebra::{Matrix2x3, Matrix3};
use opencv::core;
use opencv::prelude::*;

use crate::error::{Error, Result};
use crate::types::RasterImage;

pub fn raster_to_mat(image: &RasterImage) -> Result<core::Mat> {
    let flat = core::Mat::from_slice(&image.data).map_err(Error::from)?;
    flat.reshape(3, image.height as i32).map_err(Error::from)
}

pub fn mat_to_raster(mat: &core::Mat) -> Result<RasterImage> {
    let width = mat.cols() as u32;
    let height = mat.rows() as u32;
    let data = mat.data_bytes().map_err(Error::from)?.to_vec();
    Ok(RasterImage { width, height, data })
}

pub fn matrix3_to_mat(m: &Matrix3<f64>) -> Result<core::Mat> {
    let mut out = core::Mat::zeros(3, 3, core::CV_64F)
        .map_err(Error::from)?
        .to_mat()
        .map_err(Error::from)?;
    for r in 0..3 {
        for c in 0..3 {
            *out.at_2d_mut::<f64>(r, c).map_err(Error::from)? = m[(r as usize, c as usize)];
        }
    }
    Ok(out)
}

pub fn matrix2x3_to_mat(m: &Matrix2x3<f64>) -> Result<core::Mat> {
    let mut out = core::Mat::zeros(2, 3, core::CV_64F)
        .map_err(Error::from)?
        .to_mat()
        .map_err(Error::from)?;
    for r in 0..2 {
        for c in 0..3 {
            *out.at_2d_mut::<f64>(r, c).map_err(Error::from)? = m[(r as usize, c as usize)];
        }
    }
    Ok(out)
}

pub fn mat_to_matrix3(m: &core::Mat) -> Result<Matrix3<f64>> {
    let mut out = Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            out[(r as usize, c as usize)] = *m.at_2d::<f64>(r, c).map_err(Error::from)?;
        }
    }
    Ok(out)
}

pub fn mat_to_matrix2x3(m: &core::Mat) -> Result<Matrix2x3<f64>> {
    let mut out = Matrix2x3::zeros();
    for r in 0..2 {
        for c in 0..3 {
            out[(r as usize, c as usize)] = *m.at_2d::<f64>(r, c).map_err(Error::from)?;
        }
    }
    Ok(out)
}

pub fn read_image(path: &std::path::Path) -> Result<RasterImage> {
    let mat = opencv::imgcodecs::imread(
        path.to_string_lossy().as_ref(),
        opencv::imgcodecs::IMREAD_COLOR,
    )
    .map_err(Error::from)?;
    if mat.empty() {
        return Err(Error::Io(format!("failed to read image: {}", path.display())));
    }
    mat_to_raster(&mat)
}

pub fn write_image(path: &std::path::Path, image: &RasterImage) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mat = raster_to_mat(image)?;
    opencv::imgcodecs::imwrite(
        path.to_string_lossy().as_ref(),
        &mat,
        &core::Vector::<i32>::new(),
    )
    .map_err(Error::from)?;
    Ok(())
}
