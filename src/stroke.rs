//! Captured brush strokes: the input records for ribbon export.
//!
//! A stroke is a polyline with parallel per-point normals and widths, a color
//! (uniform or per point) and a UV mapping mode. Strokes are immutable for the
//! duration of one export.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// How texture coordinates run along the ribbon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UvMode {
    /// Texture is stretched once over the whole stroke.
    #[default]
    Stretch,
    /// Texture tiles along the stroke at a rate set by its width.
    Repeat,
}

/// Stroke color, either one RGB value or one per point. Components are 0-1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrokeColor {
    Uniform([f32; 3]),
    PerPoint(Vec<[f32; 3]>),
}

impl Default for StrokeColor {
    fn default() -> Self {
        StrokeColor::Uniform([1.0, 1.0, 1.0])
    }
}

impl StrokeColor {
    /// Build a uniform color from 8-bit channels.
    pub fn from_rgb8(rgb: [u8; 3]) -> Self {
        StrokeColor::Uniform([
            rgb[0] as f32 / 255.0,
            rgb[1] as f32 / 255.0,
            rgb[2] as f32 / 255.0,
        ])
    }

    /// Color of point `index`. A single-entry per-point list acts as uniform.
    pub fn at(&self, index: usize) -> [f32; 3] {
        match self {
            StrokeColor::Uniform(rgb) => *rgb,
            StrokeColor::PerPoint(colors) if colors.len() == 1 => colors[0],
            StrokeColor::PerPoint(colors) => colors.get(index).copied().unwrap_or([1.0; 3]),
        }
    }
}

/// One captured polyline stroke.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    /// Centerline sample positions, local to `position`.
    pub points: Vec<Vec3>,
    /// Per-point surface normals.
    pub normals: Vec<Vec3>,
    /// Per-point half widths.
    pub widths: Vec<f32>,
    #[serde(default)]
    pub color: StrokeColor,
    #[serde(default)]
    pub uv_mode: UvMode,
    /// Translation added to every emitted vertex.
    #[serde(default)]
    pub offset: Vec3,
    /// World position of the stroke's origin.
    #[serde(default)]
    pub position: Vec3,
    /// Optional texture URL or file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
}

impl Stroke {
    /// Create a white, stretch-mapped stroke with no offset.
    pub fn new(points: Vec<Vec3>, normals: Vec<Vec3>, widths: Vec<f32>) -> Self {
        Self {
            points,
            normals,
            widths,
            color: StrokeColor::default(),
            uv_mode: UvMode::default(),
            offset: Vec3::ZERO,
            position: Vec3::ZERO,
            texture: None,
        }
    }

    pub fn with_color(mut self, color: StrokeColor) -> Self {
        self.color = color;
        self
    }

    pub fn with_uv_mode(mut self, uv_mode: UvMode) -> Self {
        self.uv_mode = uv_mode;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_texture(mut self, texture: impl Into<String>) -> Self {
        self.texture = Some(texture.into());
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True if any two neighbouring widths differ.
    pub fn has_varying_width(&self) -> bool {
        self.widths.windows(2).any(|w| w[0] != w[1])
    }

    /// Check the structural invariants a stroke must satisfy before meshing.
    pub fn validate(&self) -> Result<()> {
        let n = self.points.len();
        if n < 2 {
            return Err(ExportError::InvalidStroke(format!(
                "stroke needs at least 2 points, got {}",
                n
            )));
        }
        if self.normals.len() != n {
            return Err(ExportError::InvalidStroke(format!(
                "expected {} normals, got {}",
                n,
                self.normals.len()
            )));
        }
        if self.widths.len() != n {
            return Err(ExportError::InvalidStroke(format!(
                "expected {} widths, got {}",
                n,
                self.widths.len()
            )));
        }
        if let Some(w) = self.widths.iter().find(|w| !w.is_finite() || **w <= 0.0) {
            return Err(ExportError::InvalidStroke(format!(
                "widths must be positive and finite, got {}",
                w
            )));
        }
        if let StrokeColor::PerPoint(colors) = &self.color {
            if colors.len() != 1 && colors.len() != n {
                return Err(ExportError::InvalidStroke(format!(
                    "per-point colors must have 1 or {} entries, got {}",
                    n,
                    colors.len()
                )));
            }
        }
        Ok(())
    }
}
