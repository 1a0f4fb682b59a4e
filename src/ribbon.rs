//! Ribbon mesh generation from stroke centerlines.
//!
//! Each retained centerline sample is widened into two rail vertices by a
//! binormal perpendicular to the direction of travel. The rails are stitched
//! into a triangle strip; a second, inverted strip over the same vertices makes
//! the ribbon visible from both sides.
//!
//! ## Degenerate samples
//!
//! A sample whose tangent is zero, or whose normal is parallel to the tangent,
//! has no usable binormal. In [`GeometryMode::Lenient`] such samples are
//! dropped (they are common where a stroke crosses itself). In
//! [`GeometryMode::Strict`] the first one fails the whole stroke.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::stroke::{Stroke, UvMode};

/// Policy for samples that produce no binormal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeometryMode {
    #[default]
    Lenient,
    Strict,
}

/// Geometry generated for a single stroke.
#[derive(Debug, Clone, Default)]
pub struct RibbonMesh {
    /// Rail vertices, two per retained sample (left then right).
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<[f32; 3]>,
    pub uvs: Vec<Vec2>,
    /// Front-facing triangles.
    pub front_indices: Vec<[u32; 3]>,
    /// Back-facing triangles (opposite winding over the same vertices).
    pub back_indices: Vec<[u32; 3]>,
}

impl RibbonMesh {
    /// Number of centerline samples that survived.
    pub fn sample_count(&self) -> usize {
        self.vertices.len() / 2
    }

    /// Triangles across both windings.
    pub fn triangle_count(&self) -> usize {
        self.front_indices.len() + self.back_indices.len()
    }
}

/// Running texture coordinate along the stroke.
struct UvCursor {
    mode: UvMode,
    varying_width: bool,
    stretch_step: f32,
    u: f32,
    arc_length: f32,
    /// Last sample index included in `arc_length`.
    measured: usize,
    width_sum: f32,
    width_count: u32,
    started: bool,
}

impl UvCursor {
    fn new(stroke: &Stroke) -> Self {
        Self {
            mode: stroke.uv_mode,
            varying_width: stroke.has_varying_width(),
            stretch_step: 1.0 / stroke.len() as f32,
            u: 0.0,
            arc_length: 0.0,
            measured: 0,
            width_sum: 0.0,
            width_count: 0,
            started: false,
        }
    }

    /// Advance to retained sample `i` and return its `u`.
    ///
    /// Stretch pins the first retained sample to `u = 0`. Repeat measures arc
    /// length from the stroke start, so segments around skipped samples still
    /// count.
    fn advance(&mut self, stroke: &Stroke, i: usize) -> f32 {
        let first = !self.started;
        self.started = true;

        match self.mode {
            UvMode::Stretch => {
                if !first {
                    self.u += self.stretch_step;
                }
            }
            UvMode::Repeat => {
                if i == 0 {
                    return self.u;
                }
                for j in self.measured + 1..=i {
                    self.arc_length += stroke.points[j].distance(stroke.points[j - 1]);
                }
                self.measured = i;
                let width = 2.0 * stroke.widths[i];

                if self.varying_width {
                    self.width_sum += width;
                    self.width_count += 1;
                    let average_width = self.width_sum / self.width_count as f32;
                    let target = (self.arc_length / average_width).ceil();
                    let increase = target - self.u;
                    self.u += if increase > 0.0 { increase } else { 1.0 };
                } else {
                    self.u = self.arc_length / width;
                }
            }
        }
        self.u
    }
}

/// Build the ribbon for one stroke.
///
/// Fails with [`ExportError::DegenerateGeometry`] when no sample survives, or
/// in strict mode when any sample is degenerate.
pub fn build_ribbon(stroke: &Stroke, mode: GeometryMode) -> Result<RibbonMesh> {
    stroke.validate()?;

    let n = stroke.len();
    let mut mesh = RibbonMesh::default();
    let mut uv = UvCursor::new(stroke);
    let mut binormal: Option<Vec3> = None;
    let mut skipped = 0usize;

    for i in 0..n {
        let point = stroke.points[i];

        if i < n - 1 {
            let tangent = stroke.points[i + 1] - point;
            match stroke.normals[i].cross(tangent).try_normalize() {
                Some(direction) => binormal = Some(direction * stroke.widths[i]),
                None => {
                    if mode == GeometryMode::Strict {
                        return Err(ExportError::DegenerateGeometry(format!(
                            "sample {} of {} has no binormal",
                            i, n
                        )));
                    }
                    skipped += 1;
                    continue;
                }
            }
        }

        // The last sample reuses the previous binormal.
        let Some(binormal) = binormal else {
            skipped += 1;
            continue;
        };

        let offset_point = point + stroke.offset;
        mesh.vertices.push(offset_point + binormal);
        mesh.vertices.push(offset_point - binormal);

        let normal = stroke.normals[i];
        mesh.normals.push(normal);
        mesh.normals.push(normal);

        let color = stroke.color.at(i);
        mesh.colors.push(color);
        mesh.colors.push(color);

        let u = uv.advance(stroke, i);
        mesh.uvs.push(Vec2::new(u, 0.0));
        mesh.uvs.push(Vec2::new(u, 1.0));
    }

    if mesh.vertices.is_empty() {
        return Err(ExportError::DegenerateGeometry(format!(
            "all {} samples are degenerate",
            n
        )));
    }
    if skipped > 0 {
        log::debug!("Skipped {} degenerate samples of {}", skipped, n);
    }

    mesh.front_indices = triangulate(mesh.vertices.len(), false);
    mesh.back_indices = triangulate(mesh.vertices.len(), true);

    Ok(mesh)
}

/// Strip indices over `vertex_count` rail vertices.
///
/// Winding alternates with the parity of the leading index so every triangle
/// faces the same way; `inverted` flips the parity test to produce the
/// back-facing set.
pub fn triangulate(vertex_count: usize, inverted: bool) -> Vec<[u32; 3]> {
    if vertex_count < 3 {
        return Vec::new();
    }

    let parity = if inverted { 1 } else { 0 };
    (0..vertex_count - 2)
        .map(|i| {
            let i = i as u32;
            if i % 2 == parity {
                [i, i + 1, i + 2]
            } else {
                [i, i + 2, i + 1]
            }
        })
        .collect()
}
