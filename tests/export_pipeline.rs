//! End-to-end export tests: strokes in, OBJ/MTL/texture assets out.
//!
//! Run with: cargo test --test export_pipeline

use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use glam::Vec3;
use polywrap::asset_store::MemoryAssetStore;
use polywrap::error::ExportError;
use polywrap::session::{export_strokes, ExportOptions, ExportSession};
use polywrap::texture::{cancel_pair, CancelToken, TextureFetcher};
use polywrap::world::EntityCatalog;
use polywrap::{build_export_bundle, serialize, GeometryMode, ObjOptions, Stroke};

/// Serves a small PNG for any source containing "ok", fails otherwise.
struct FakeFetcher;

impl TextureFetcher for FakeFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>, ExportError> {
        if !source.contains("ok") {
            return Err(ExportError::TextureFetch {
                source_ref: source.to_string(),
                reason: "HTTP status 404 Not Found".to_string(),
            });
        }
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([0, 128, 255]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        Ok(out.into_inner())
    }
}

fn straight_stroke(y: f32) -> Stroke {
    let points = (0..3).map(|i| Vec3::new(i as f32, y, 0.0)).collect();
    Stroke::new(points, vec![Vec3::Y; 3], vec![0.1; 3])
}

fn parse_obj(obj: &str) -> Vec<tobj::Model> {
    let mut cursor = Cursor::new(obj.as_bytes());
    let options = tobj::LoadOptions {
        triangulate: false,
        single_index: false,
        ..Default::default()
    };
    let (models, _materials) =
        tobj::load_obj_buf(&mut cursor, &options, |_| Ok((vec![], HashMap::new())))
            .expect("exported OBJ should parse");
    models
}

const CATALOG: &str = r#"[
    {
        "id": "first",
        "position": [1, 0, 0],
        "linePoints": [[0, 0, 0], [1, 0, 0], [2, 0, 0]],
        "normals": [[0, 1, 0], [0, 1, 0], [0, 1, 0]],
        "strokeWidths": [0.1, 0.1, 0.1],
        "textures": "https://cdn.example.com/ok/brush0.png"
    },
    {
        "id": "second",
        "position": [1, 2, 0],
        "linePoints": [[0, 0, 0], [1, 0, 0], [2, 0, 0]],
        "normals": [[0, 1, 0], [0, 1, 0], [0, 1, 0]],
        "strokeWidths": [0.1, 0.1, 0.2],
        "isUVModeStretch": false,
        "textures": "https://cdn.example.com/ok/brush1.jpg"
    }
]"#;

#[test]
fn test_two_straight_strokes_end_to_end() {
    let strokes = vec![straight_stroke(0.0), straight_stroke(1.0)];
    let bundle = build_export_bundle(&strokes, GeometryMode::Lenient).unwrap();

    assert_eq!(bundle.vertex_count(), 12);
    let labels: Vec<&str> = bundle.groups.iter().map(|g| g.label.as_str()).collect();
    assert_eq!(labels, vec!["polyline0", "polyline1"]);
    for group in &bundle.groups {
        // 4 triangles per winding set
        assert_eq!(group.faces.len(), 8);
    }
}

#[test]
fn test_serialized_obj_round_trips_through_parser() {
    let strokes = vec![straight_stroke(0.0), straight_stroke(1.0), straight_stroke(2.0)];
    let bundle = build_export_bundle(&strokes, GeometryMode::Lenient).unwrap();
    let doc = serialize(&bundle, &ObjOptions::default());

    let models = parse_obj(&doc.obj);
    assert!(!models.is_empty());

    let mut triangles = 0;
    for model in &models {
        let mesh = &model.mesh;
        let vertex_count = mesh.positions.len() / 3;
        assert!(mesh.indices.iter().all(|&i| (i as usize) < vertex_count));
        triangles += mesh.indices.len() / 3;
    }
    assert_eq!(triangles, bundle.face_count());
}

#[tokio::test]
async fn test_session_export_with_textures() {
    let catalog = EntityCatalog::from_json(CATALOG).unwrap();
    let store = MemoryAssetStore::new();
    let mut session = ExportSession::new("wrap").with_next_file_number(7);
    session.add("first");
    session.add("second");

    let report = session
        .export(
            &catalog,
            &FakeFetcher,
            &store,
            &ExportOptions::default(),
            CancelToken::never(),
        )
        .await
        .unwrap();

    assert_eq!(report.name, "wrap7");
    assert_eq!(report.stroke_count, 2);
    assert_eq!(report.vertex_count, 12);
    assert_eq!(report.textures.len(), 2);
    assert_eq!(session.next_file_number(), 8);

    // MTL first, OBJ last, textures in between in any order.
    let order = store.write_order();
    assert_eq!(order.len(), 4);
    assert_eq!(order[0], "wrap7.mtl");
    assert_eq!(order[3], "wrap7.obj");
    assert!(store.contains("wrap7/texture0.png"));
    assert!(store.contains("wrap7/texture1.png"));

    let obj = store.get_string("wrap7.obj").unwrap();
    assert!(obj.contains("mtllib wrap7.mtl"));
    let mtl = store.get_string("wrap7.mtl").unwrap();
    assert!(mtl.contains("map_Kd wrap7/texture1.png"));
    assert_eq!(report.obj.hash, polywrap::asset_store::content_hash(obj.as_bytes()));
}

#[tokio::test]
async fn test_second_stroke_is_anchored_to_first() {
    let catalog = EntityCatalog::from_json(CATALOG).unwrap();
    let store = MemoryAssetStore::new();
    let mut session = ExportSession::default();
    session.add("first");
    session.add("second");

    let options = ExportOptions {
        use_textures: false,
        ..Default::default()
    };
    session
        .export(&catalog, &FakeFetcher, &store, &options, CancelToken::never())
        .await
        .unwrap();

    let obj = store.get_string("wrap1.obj").unwrap();
    let ys: Vec<f32> = obj
        .lines()
        .filter(|l| l.starts_with("v "))
        .map(|l| l.split_whitespace().nth(2).unwrap().parse().unwrap())
        .collect();
    // second entity sits 2 units above the first
    assert!(ys[..6].iter().all(|y| y.abs() < 1e-6));
    assert!(ys[6..].iter().all(|y| (y - 2.0).abs() < 1e-6));
}

#[tokio::test]
async fn test_export_without_textures_writes_only_obj() {
    let store = MemoryAssetStore::new();
    let options = ExportOptions {
        use_textures: false,
        ..Default::default()
    };
    let strokes = vec![straight_stroke(0.0).with_texture("https://cdn.example.com/ok/a.png")];

    let report = export_strokes(
        &strokes,
        "plain1",
        &FakeFetcher,
        &store,
        &options,
        CancelToken::never(),
    )
    .await
    .unwrap();

    assert!(report.mtl.is_none());
    assert!(report.textures.is_empty());
    assert_eq!(store.write_order(), vec!["plain1.obj"]);
    assert!(!store.get_string("plain1.obj").unwrap().contains("mtllib"));
}

#[tokio::test]
async fn test_failed_texture_blocks_obj_upload() {
    let store = MemoryAssetStore::new();
    let strokes = vec![
        straight_stroke(0.0).with_texture("https://cdn.example.com/ok/a.png"),
        straight_stroke(1.0).with_texture("https://cdn.example.com/missing.png"),
    ];

    let result = export_strokes(
        &strokes,
        "broken1",
        &FakeFetcher,
        &store,
        &ExportOptions {
            upload_timeout: Duration::from_secs(5),
            ..Default::default()
        },
        CancelToken::never(),
    )
    .await;

    assert!(matches!(result, Err(ExportError::TextureFetch { .. })));
    assert!(!store.contains("broken1.obj"));
}

#[tokio::test]
async fn test_empty_selection_keeps_file_number() {
    let catalog = EntityCatalog::from_json(CATALOG).unwrap();
    let store = MemoryAssetStore::new();
    let mut session = ExportSession::default();

    let result = session
        .export(
            &catalog,
            &FakeFetcher,
            &store,
            &ExportOptions::default(),
            CancelToken::never(),
        )
        .await;
    assert!(matches!(result, Err(ExportError::EmptyExport(_))));

    session.add("does-not-exist");
    let result = session
        .export(
            &catalog,
            &FakeFetcher,
            &store,
            &ExportOptions::default(),
            CancelToken::never(),
        )
        .await;
    assert!(matches!(result, Err(ExportError::EmptyExport(_))));
    assert_eq!(session.next_file_number(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_cancelled_export_keeps_file_number() {
    let catalog = EntityCatalog::from_json(CATALOG).unwrap();
    let store = MemoryAssetStore::new();
    let mut session = ExportSession::new("wrap").with_next_file_number(4);
    session.add("first");

    let (handle, cancel) = cancel_pair();
    handle.cancel();
    let result = session
        .export(&catalog, &FakeFetcher, &store, &ExportOptions::default(), cancel)
        .await;
    assert!(matches!(result, Err(ExportError::Cancelled)));
    assert_eq!(session.next_file_number(), 4);
    assert!(!store.contains("wrap4.obj"));

    let report = session
        .export(
            &catalog,
            &FakeFetcher,
            &store,
            &ExportOptions::default(),
            CancelToken::never(),
        )
        .await
        .unwrap();
    assert_eq!(report.name, "wrap4");
    assert_eq!(session.next_file_number(), 5);
}

#[test]
fn test_strict_mode_skips_stroke_with_degenerate_sample() {
    let mut kinked = straight_stroke(0.0);
    kinked.points = vec![
        Vec3::ZERO,
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(2.0, 0.0, 0.0),
    ];
    kinked.normals = vec![Vec3::Y; 4];
    kinked.widths = vec![0.1; 4];
    let strokes = vec![straight_stroke(1.0), kinked];

    let lenient = build_export_bundle(&strokes, GeometryMode::Lenient).unwrap();
    assert_eq!(lenient.groups.len(), 2);
    assert_eq!(lenient.vertex_count(), 6 + 6);

    let strict = build_export_bundle(&strokes, GeometryMode::Strict).unwrap();
    assert_eq!(strict.groups.len(), 1);
    assert_eq!(strict.skipped[0].stroke_index, 1);
}

#[test]
fn test_select_near_replaces_selection() {
    let catalog = EntityCatalog::from_json(CATALOG).unwrap();
    let mut session = ExportSession::default();
    session.add("stale");

    let found = session.select_near(&catalog, Vec3::new(1.0, 0.0, 0.0), 1.0);
    assert_eq!(found, 1);
    assert_eq!(session.selection(), &["first".to_string()]);
}
