//! Parses the pose-file wire format: one record per line,
//! `filename, x, y, z, yaw, pitch, roll`, dot-decimal floats. Ordering in
//! the file is the assembly order.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Pose;

#[derive(Clone, Debug, PartialEq)]
pub struct PoseRecord {
    pub filename: String,
    pub pose: Pose,
}

pub fn parse(contents: &str) -> Result<Vec<PoseRecord>> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}

pub fn read_file(path: &Path) -> Result<Vec<PoseRecord>> {
    let contents = std::fs::read_to_string(path)?;
    parse(&contents)
}

fn parse_line(line: &str) -> Result<PoseRecord> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 7 {
        return Err(Error::Io(format!(
            "malformed pose record (expected 7 comma-separated fields, got {}): {line}",
            fields.len()
        )));
    }
    let filename = fields[0].to_string();
    let mut nums = [0.0f64; 6];
    for (i, field) in fields[1..].iter().enumerate() {
        nums[i] = field
            .parse::<f64>()
            .map_err(|_| Error::Io(format!("malformed float {field:?} in pose record: {line}")))?;
    }
    Ok(PoseRecord {
        filename,
        pose: Pose {
            x: nums[0],
            y: nums[1],
            z: nums[2],
            yaw: nums[3],
            pitch: nums[4],
            roll: nums[5],
        },
    })
}
