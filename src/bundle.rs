//! Merging several stroke ribbons into one exportable mesh.
//!
//! Strokes are re-anchored to the first stroke's position so the combined mesh
//! shares a single coordinate frame. Each retained stroke owns one contiguous
//! range of faces tagged with a `polyline<index>` material label.

use std::ops::Range;

use glam::{Vec2, Vec3};

use crate::error::{ExportError, Result};
use crate::ribbon::{build_ribbon, GeometryMode, RibbonMesh};
use crate::stroke::Stroke;

/// A labelled range of faces contributed by one stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialGroup {
    /// Material label, `polyline<index>`.
    pub label: String,
    /// Index of the source stroke in submission order.
    pub stroke_index: usize,
    /// Texture reference carried over from the stroke.
    pub texture: Option<String>,
    /// Range into [`ExportBundle::faces`].
    pub faces: Range<usize>,
}

/// A stroke that produced no geometry.
#[derive(Debug, Clone)]
pub struct SkippedStroke {
    pub stroke_index: usize,
    pub reason: String,
}

/// Combined mesh for a batch of strokes.
#[derive(Debug, Clone, Default)]
pub struct ExportBundle {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<[f32; 3]>,
    pub uvs: Vec<Vec2>,
    /// Triangles over `vertices`, grouped per stroke: front faces then back faces.
    pub faces: Vec<[u32; 3]>,
    /// One group per retained stroke, in submission order.
    pub groups: Vec<MaterialGroup>,
    pub skipped: Vec<SkippedStroke>,
}

impl ExportBundle {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// True if any group carries a texture reference.
    pub fn has_textures(&self) -> bool {
        self.groups.iter().any(|g| g.texture.is_some())
    }

    fn append(&mut self, ribbon: RibbonMesh, stroke_index: usize, texture: Option<String>) {
        let base = self.vertices.len() as u32;
        let face_start = self.faces.len();

        let rebase = |tri: &[u32; 3]| tri.map(|i| i + base);
        self.faces.extend(ribbon.front_indices.iter().map(rebase));
        self.faces.extend(ribbon.back_indices.iter().map(rebase));

        self.vertices.extend(ribbon.vertices);
        self.normals.extend(ribbon.normals);
        self.colors.extend(ribbon.colors);
        self.uvs.extend(ribbon.uvs);

        self.groups.push(MaterialGroup {
            label: material_label(stroke_index),
            stroke_index,
            texture,
            faces: face_start..self.faces.len(),
        });
    }
}

/// Material label for the stroke at `index`.
pub fn material_label(index: usize) -> String {
    format!("polyline{}", index)
}

/// Build ribbons for all strokes and merge them.
///
/// A stroke that fails to mesh is logged and recorded in
/// [`ExportBundle::skipped`]; the export continues without it. Fails with
/// [`ExportError::EmptyExport`] if nothing is left.
pub fn build_export_bundle(strokes: &[Stroke], mode: GeometryMode) -> Result<ExportBundle> {
    let Some(first) = strokes.first() else {
        return Err(ExportError::EmptyExport("no strokes supplied".to_string()));
    };
    let origin = first.position;

    let mut bundle = ExportBundle::default();
    for (index, stroke) in strokes.iter().enumerate() {
        let mut anchored = stroke.clone();
        anchored.offset += stroke.position - origin;

        match build_ribbon(&anchored, mode) {
            Ok(ribbon) => bundle.append(ribbon, index, stroke.texture.clone()),
            Err(e @ (ExportError::DegenerateGeometry(_) | ExportError::InvalidStroke(_))) => {
                log::warn!("Skipping stroke {}: {}", index, e);
                bundle.skipped.push(SkippedStroke {
                    stroke_index: index,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    if bundle.groups.is_empty() {
        return Err(ExportError::EmptyExport(format!(
            "all {} strokes were skipped",
            strokes.len()
        )));
    }

    log::info!(
        "Built export bundle: {} strokes, {} vertices, {} faces",
        bundle.groups.len(),
        bundle.vertex_count(),
        bundle.face_count()
    );
    Ok(bundle)
}
