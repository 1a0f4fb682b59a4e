//! World access for resolving selected polyline entities into strokes.

use std::collections::HashMap;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stroke::{Stroke, StrokeColor, UvMode};

/// Identifier of a polyline entity in the host world.
pub type EntityId = String;

/// Properties of a polyline entity as reported by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolylineEntity {
    pub id: EntityId,
    #[serde(default)]
    pub position: Vec3,
    pub line_points: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub stroke_widths: Vec<f32>,
    /// Per-point colors, 0-1. Empty or single-entry means use `color`.
    #[serde(default)]
    pub stroke_colors: Vec<[f32; 3]>,
    /// Entity color, 8-bit RGB.
    #[serde(default = "default_entity_color")]
    pub color: [u8; 3],
    #[serde(
        default = "default_stretch",
        rename = "isUVModeStretch",
        alias = "isUvModeStretch"
    )]
    pub is_uv_mode_stretch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub textures: Option<String>,
}

fn default_entity_color() -> [u8; 3] {
    [255, 255, 255]
}

fn default_stretch() -> bool {
    true
}

impl PolylineEntity {
    /// Convert the entity's properties into a stroke record.
    pub fn to_stroke(&self) -> Stroke {
        let color = if self.stroke_colors.len() > 1 {
            StrokeColor::PerPoint(self.stroke_colors.clone())
        } else {
            StrokeColor::from_rgb8(self.color)
        };
        let uv_mode = if self.is_uv_mode_stretch {
            UvMode::Stretch
        } else {
            UvMode::Repeat
        };

        Stroke {
            points: self.line_points.clone(),
            normals: self.normals.clone(),
            widths: self.stroke_widths.clone(),
            color,
            uv_mode,
            offset: Vec3::ZERO,
            position: self.position,
            texture: self.textures.clone().filter(|t| !t.is_empty()),
        }
    }
}

/// Read access to the host world.
pub trait WorldQuery {
    /// Properties of a polyline entity, if it exists.
    fn polyline(&self, id: &str) -> Option<PolylineEntity>;

    /// Ids of polyline entities whose position is within `radius` of `center`.
    fn polylines_near(&self, center: Vec3, radius: f32) -> Vec<EntityId>;
}

/// A static set of polyline entities, usually loaded from JSON.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entities: HashMap<EntityId, PolylineEntity>,
    order: Vec<EntityId>,
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: impl IntoIterator<Item = PolylineEntity>) -> Self {
        let mut catalog = Self::new();
        for entity in entities {
            catalog.insert(entity);
        }
        catalog
    }

    /// Parse a JSON array of polyline entities.
    pub fn from_json(json: &str) -> Result<Self> {
        let entities: Vec<PolylineEntity> = serde_json::from_str(json)?;
        Ok(Self::from_entities(entities))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn insert(&mut self, entity: PolylineEntity) {
        if !self.entities.contains_key(&entity.id) {
            self.order.push(entity.id.clone());
        }
        self.entities.insert(entity.id.clone(), entity);
    }

    /// All ids in insertion order.
    pub fn ids(&self) -> &[EntityId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl WorldQuery for EntityCatalog {
    fn polyline(&self, id: &str) -> Option<PolylineEntity> {
        self.entities.get(id).cloned()
    }

    fn polylines_near(&self, center: Vec3, radius: f32) -> Vec<EntityId> {
        self.order
            .iter()
            .filter(|id| {
                self.entities
                    .get(*id)
                    .is_some_and(|e| e.position.distance(center) <= radius)
            })
            .cloned()
            .collect()
    }
}
