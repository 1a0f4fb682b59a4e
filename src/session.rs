//! Export session: the polyline selection and file numbering for a user's
//! exports, plus the pipeline that publishes one export.
//!
//! Publishing order matters to consumers that load the OBJ as soon as it
//! appears: the material library is written first, then every texture, and
//! the OBJ last.

use std::time::Duration;

use chrono::Utc;
use glam::Vec3;

use crate::asset_store::AssetStore;
use crate::bundle::{build_export_bundle, ExportBundle};
use crate::error::{ExportError, Result};
use crate::job::ExportReport;
use crate::obj_writer::{serialize, texture_path, ObjOptions};
use crate::ribbon::GeometryMode;
use crate::stroke::Stroke;
use crate::texture::{gather_textures, CancelToken, TextureFetcher, TextureJob};
use crate::world::{EntityId, WorldQuery};

/// How an export is built and published.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub geometry_mode: GeometryMode,
    /// Write a material library and re-host textures before the OBJ.
    pub use_textures: bool,
    /// Upper bound on waiting for all texture uploads.
    pub upload_timeout: Duration,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            geometry_mode: GeometryMode::Lenient,
            use_textures: true,
            upload_timeout: Duration::from_secs(60),
        }
    }
}

/// Texture jobs for every textured group in the bundle.
pub fn texture_jobs(bundle: &ExportBundle, name: &str) -> Vec<TextureJob> {
    bundle
        .groups
        .iter()
        .filter_map(|group| {
            group.texture.as_ref().map(|source| TextureJob {
                stroke_index: group.stroke_index,
                source: source.clone(),
                target: texture_path(name, group.stroke_index),
            })
        })
        .collect()
}

/// Serialize a bundle and write its assets under `name`.
pub async fn publish_bundle<F, S>(
    bundle: &ExportBundle,
    name: &str,
    fetcher: &F,
    store: &S,
    options: &ExportOptions,
    cancel: CancelToken,
) -> Result<ExportReport>
where
    F: TextureFetcher,
    S: AssetStore,
{
    let started_at = Utc::now();
    let document = serialize(
        bundle,
        &ObjOptions {
            name: name.to_string(),
            with_materials: options.use_textures,
        },
    );

    let mut mtl = None;
    let mut textures = Vec::new();
    if let Some(library) = document.mtl {
        mtl = Some(store.put(&format!("{}.mtl", name), library.into_bytes()).await?);

        let jobs = texture_jobs(bundle, name);
        textures = gather_textures(&jobs, fetcher, store, options.upload_timeout, cancel).await?;
    }

    let obj = store
        .put(&format!("{}.obj", name), document.obj.into_bytes())
        .await?;
    log::info!("Exported {} ({} faces)", obj.path, bundle.face_count());

    Ok(ExportReport {
        name: name.to_string(),
        obj,
        mtl,
        textures,
        stroke_count: bundle.groups.len(),
        vertex_count: bundle.vertex_count(),
        face_count: bundle.face_count(),
        skipped_strokes: bundle.skipped.iter().map(|s| s.stroke_index).collect(),
        started_at,
        completed_at: Utc::now(),
    })
}

/// Build and publish a list of strokes under `name`.
pub async fn export_strokes<F, S>(
    strokes: &[Stroke],
    name: &str,
    fetcher: &F,
    store: &S,
    options: &ExportOptions,
    cancel: CancelToken,
) -> Result<ExportReport>
where
    F: TextureFetcher,
    S: AssetStore,
{
    let bundle = build_export_bundle(strokes, options.geometry_mode)?;
    publish_bundle(&bundle, name, fetcher, store, options, cancel).await
}

/// Selection and numbering state carried between exports.
#[derive(Debug, Clone)]
pub struct ExportSession {
    file_prefix: String,
    next_file_number: u32,
    selection: Vec<EntityId>,
}

impl Default for ExportSession {
    fn default() -> Self {
        Self::new("wrap")
    }
}

impl ExportSession {
    pub fn new(file_prefix: impl Into<String>) -> Self {
        Self {
            file_prefix: file_prefix.into(),
            next_file_number: 1,
            selection: Vec::new(),
        }
    }

    /// Resume numbering from a previously persisted counter.
    pub fn with_next_file_number(mut self, number: u32) -> Self {
        self.next_file_number = number;
        self
    }

    pub fn next_file_number(&self) -> u32 {
        self.next_file_number
    }

    /// Name the next export will be written under, e.g. `wrap4`.
    pub fn pending_file_name(&self) -> String {
        format!("{}{}", self.file_prefix, self.next_file_number)
    }

    /// Claim the next file name and advance the counter.
    pub fn next_file_name(&mut self) -> String {
        let name = self.pending_file_name();
        self.next_file_number += 1;
        name
    }

    /// Selected entity ids in selection order.
    pub fn selection(&self) -> &[EntityId] {
        &self.selection
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.iter().any(|s| s == id)
    }

    /// Add an entity; returns false if it was already selected.
    pub fn add(&mut self, id: impl Into<EntityId>) -> bool {
        let id = id.into();
        if self.is_selected(&id) {
            return false;
        }
        self.selection.push(id);
        true
    }

    /// Remove an entity; returns false if it was not selected.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.selection.len();
        self.selection.retain(|s| s != id);
        self.selection.len() != before
    }

    /// Flip selection of an entity; returns whether it is now selected.
    pub fn toggle(&mut self, id: impl Into<EntityId>) -> bool {
        let id = id.into();
        if self.remove(&id) {
            false
        } else {
            self.selection.push(id);
            true
        }
    }

    /// Remove several entities, returning the ones that were selected.
    pub fn remove_many<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> Vec<EntityId> {
        ids.into_iter()
            .filter(|id| self.remove(id))
            .map(str::to_string)
            .collect()
    }

    pub fn clear(&mut self) {
        self.selection.clear();
    }

    /// Replace the selection with every polyline within `radius` of `center`.
    pub fn select_near<W: WorldQuery>(&mut self, world: &W, center: Vec3, radius: f32) -> usize {
        self.selection = world.polylines_near(center, radius);
        log::info!("Selected {} polylines near {}", self.selection.len(), center);
        self.selection.len()
    }

    /// Resolve the selection to strokes, skipping ids the world no longer has.
    pub fn resolve_strokes<W: WorldQuery>(&self, world: &W) -> Vec<Stroke> {
        self.selection
            .iter()
            .filter_map(|id| {
                let entity = world.polyline(id);
                if entity.is_none() {
                    log::warn!("Selected polyline {} not found, skipping", id);
                }
                entity.map(|e| e.to_stroke())
            })
            .collect()
    }

    /// Export the current selection.
    ///
    /// The file number is only claimed when the OBJ has been published, so a
    /// failed or cancelled export reuses it.
    pub async fn export<W, F, S>(
        &mut self,
        world: &W,
        fetcher: &F,
        store: &S,
        options: &ExportOptions,
        cancel: CancelToken,
    ) -> Result<ExportReport>
    where
        W: WorldQuery,
        F: TextureFetcher,
        S: AssetStore,
    {
        if self.selection.is_empty() {
            return Err(ExportError::EmptyExport("no polylines selected".to_string()));
        }

        let strokes = self.resolve_strokes(world);
        let bundle = build_export_bundle(&strokes, options.geometry_mode)?;
        let name = self.pending_file_name();
        let report = publish_bundle(&bundle, &name, fetcher, store, options, cancel).await?;
        self.next_file_name();
        Ok(report)
    }
}
