//! Minimal, dependency-free `.traces` fill fragment codec.
//!
//! The full `.traces` format is a zipped bundle of path and fill XML; this
//! module owns only the fill fragment's field contract (enough for the R1
//! round-trip property), not a zip/XML document parser. Kept hand-rolled
//! rather than pulled in from a crate because the fragment's grammar is a
//! single fixed shape this crate itself both writes and reads.

use crate::calibration::Voxel;
use crate::error::{Result, SntError};
use crate::node::NodeStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct TracesNode {
    pub id: u64,
    pub voxel: Voxel,
    pub previous_id: Option<u64>,
    pub distance: f64,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TracesFill {
    pub id: u64,
    pub frompaths: Vec<u64>,
    pub volume: String,
    pub metric: String,
    pub threshold: f64,
    pub nodes: Vec<TracesNode>,
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

/// Serialises a fill as
/// `<fill id=... frompaths="..." volume=... metric=... threshold=...><node .../>...</fill>`.
pub fn serialize(fill: &TracesFill) -> String {
    let frompaths = fill.frompaths.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
    let mut out = format!(
        "<fill id=\"{}\" frompaths=\"{}\" volume=\"{}\" metric=\"{}\" threshold=\"{}\">\n",
        fill.id,
        escape(&frompaths),
        escape(&fill.volume),
        escape(&fill.metric),
        fill.threshold
    );
    for node in &fill.nodes {
        out.push_str(&format!(
            "<node id=\"{}\" x=\"{}\" y=\"{}\" z=\"{}\" previousid=\"{}\" distance=\"{}\" status=\"{}\"/>\n",
            node.id,
            node.voxel.x,
            node.voxel.y,
            node.voxel.z,
            node.previous_id.map(|id| id as i64).unwrap_or(-1),
            node.distance,
            if node.closed { "closed" } else { "open" },
        ));
    }
    out.push_str("</fill>\n");
    out
}

fn attr<'a>(tag: &'a str, name: &str) -> Result<&'a str> {
    let needle = format!("{name}=\"");
    let start = tag.find(&needle).ok_or_else(|| SntError::MalformedInput {
        format: "traces",
        reason: format!("missing attribute {name}"),
    })?;
    let rest = &tag[start + needle.len()..];
    let end = rest.find('"').ok_or_else(|| SntError::MalformedInput {
        format: "traces",
        reason: format!("unterminated attribute {name}"),
    })?;
    Ok(&rest[..end])
}

fn parse_f64(tag: &str, name: &str) -> Result<f64> {
    attr(tag, name)?.parse::<f64>().map_err(|_| SntError::MalformedInput {
        format: "traces",
        reason: format!("attribute {name} is not a number"),
    })
}

fn parse_i64(tag: &str, name: &str) -> Result<i64> {
    attr(tag, name)?.parse::<i64>().map_err(|_| SntError::MalformedInput {
        format: "traces",
        reason: format!("attribute {name} is not an integer"),
    })
}

/// Parses text produced by [`serialize`] back into a `TracesFill`.
pub fn parse(input: &str) -> Result<TracesFill> {
    let fill_open_end = input.find('>').ok_or_else(|| SntError::MalformedInput {
        format: "traces",
        reason: "no <fill ...> opening tag".into(),
    })?;
    let fill_tag = &input[..fill_open_end];
    if !fill_tag.trim_start().starts_with("<fill") {
        return Err(SntError::MalformedInput { format: "traces", reason: "expected <fill ...>".into() });
    }

    let id = parse_i64(fill_tag, "id")? as u64;
    let frompaths_raw = attr(fill_tag, "frompaths")?;
    let frompaths = if frompaths_raw.is_empty() {
        Vec::new()
    } else {
        frompaths_raw
            .split(',')
            .map(|s| s.parse::<u64>().map_err(|_| SntError::MalformedInput { format: "traces", reason: "bad frompaths id".into() }))
            .collect::<Result<Vec<_>>>()?
    };
    let volume = attr(fill_tag, "volume")?.to_string();
    let metric = attr(fill_tag, "metric")?.to_string();
    let threshold = parse_f64(fill_tag, "threshold")?;

    let mut nodes = Vec::new();
    for line in input[fill_open_end + 1..].lines() {
        let line = line.trim();
        if !line.starts_with("<node") {
            continue;
        }
        let previous_raw = parse_i64(line, "previousid")?;
        nodes.push(TracesNode {
            id: parse_i64(line, "id")? as u64,
            voxel: Voxel::new(parse_i64(line, "x")?, parse_i64(line, "y")?, parse_i64(line, "z")?),
            previous_id: if previous_raw < 0 { None } else { Some(previous_raw as u64) },
            distance: parse_f64(line, "distance")?,
            closed: attr(line, "status")? == "closed",
        });
    }

    Ok(TracesFill { id, frompaths, volume, metric, threshold, nodes })
}

impl TracesNode {
    pub fn status(&self) -> NodeStatus {
        if self.closed {
            NodeStatus::ClosedFromStart
        } else {
            NodeStatus::OpenFromStart
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TracesFill {
        TracesFill {
            id: 7,
            frompaths: vec![1, 2],
            volume: "vesselness".into(),
            metric: "reciprocal".into(),
            threshold: 2.5,
            nodes: vec![
                TracesNode { id: 1, voxel: Voxel::new(0, 0, 0), previous_id: None, distance: 0.0, closed: true },
                TracesNode { id: 2, voxel: Voxel::new(1, 0, 0), previous_id: Some(1), distance: 1.0, closed: false },
            ],
        }
    }

    #[test]
    fn round_trips_fill_fields() {
        let fill = sample();
        let text = serialize(&fill);
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed, fill);
    }

    #[test]
    fn missing_attribute_is_malformed_input() {
        let err = parse("<fill id=\"1\" volume=\"v\" metric=\"m\" threshold=\"1\"></fill>").unwrap_err();
        assert!(matches!(err, SntError::MalformedInput { .. }));
    }
}
