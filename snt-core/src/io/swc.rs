//! Minimal reference SWC loader/writer.
//!
//! This crate does not own a full SWC dialect parser. Callers are expected
//! to supply `Path` objects from their own loader. This module is good
//! enough to round-trip what [`write`] itself produces: a single unbranched
//! chain, one parent per line, ids assigned in path order starting at 1.

use crate::calibration::Calibration;
use crate::error::{Result, SntError};
use crate::path::{Path, PathPoint, SwcType};

fn swc_type_from_code(code: i32) -> SwcType {
    match code {
        1 => SwcType::Soma,
        2 => SwcType::Axon,
        3 => SwcType::BasalDendrite,
        4 => SwcType::ApicalDendrite,
        _ => SwcType::Undefined,
    }
}

/// Writes `path` as SWC text: `id type x y z radius parent_id`, one node per
/// line, `id` starting at 1 and `parent_id = -1` for the first node.
pub fn write(path: &Path) -> String {
    let mut out = String::new();
    for (i, point) in path.points().iter().enumerate() {
        let id = i + 1;
        let parent = if i == 0 { -1 } else { id as i64 - 1 };
        let radius = point.radius.unwrap_or(1.0);
        out.push_str(&format!(
            "{} {} {:.6} {:.6} {:.6} {:.6} {}\n",
            id,
            path.swc_type().code(),
            point.x,
            point.y,
            point.z,
            radius,
            parent
        ));
    }
    out
}

/// Parses SWC text produced by [`write`] (or any single unbranched chain
/// listed in parent order) back into a `Path`.
pub fn parse(input: &str) -> Result<Path> {
    let mut points = Vec::new();
    let mut swc_type = SwcType::Undefined;

    for (lineno, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 7 {
            return Err(SntError::MalformedInput {
                format: "swc",
                reason: format!("line {}: expected 7 columns, found {}", lineno + 1, fields.len()),
            });
        }
        let parse_f = |s: &str| -> Result<f64> {
            s.parse::<f64>().map_err(|_| SntError::MalformedInput {
                format: "swc",
                reason: format!("line {}: not a number: {s}", lineno + 1),
            })
        };
        let type_code: i32 = fields[1].parse().map_err(|_| SntError::MalformedInput {
            format: "swc",
            reason: format!("line {}: bad type column", lineno + 1),
        })?;
        if points.is_empty() {
            swc_type = swc_type_from_code(type_code);
        }
        points.push(PathPoint {
            x: parse_f(fields[2])?,
            y: parse_f(fields[3])?,
            z: parse_f(fields[4])?,
            radius: Some(parse_f(fields[5])?),
        });
    }

    if points.is_empty() {
        return Err(SntError::MalformedInput { format: "swc", reason: "no nodes found".into() });
    }

    Ok(Path::new(points, swc_type))
}

/// `parse` followed by rescaling through `calibration`'s inverse is
/// unnecessary here since SWC coordinates are already physical; kept as a
/// visible no-op hook so callers reading differently-calibrated SWC files
/// have an obvious place to adapt this loader.
pub fn parse_with_calibration(input: &str, _calibration: &Calibration) -> Result<Path> {
    parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Voxel;

    #[test]
    fn write_then_parse_round_trips_points() {
        let cal = Calibration::isotropic(0.5, "um");
        let voxels = vec![Voxel::new(0, 0, 0), Voxel::new(1, 1, 0), Voxel::new(2, 2, 0)];
        let path = Path::from_voxels(&voxels, &cal, SwcType::Axon);
        let text = write(&path);
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.len(), path.len());
        assert_eq!(parsed.swc_type(), SwcType::Axon);
        for (a, b) in parsed.points().iter().zip(path.points().iter()) {
            assert!((a.x - b.x).abs() < 1e-6);
            assert!((a.y - b.y).abs() < 1e-6);
            assert!((a.z - b.z).abs() < 1e-6);
        }
    }

    #[test]
    fn malformed_line_is_rejected() {
        let err = parse("1 2 0 0 0\n").unwrap_err();
        assert!(matches!(err, SntError::MalformedInput { .. }));
    }
}
