//! Wavefront OBJ / MTL serialization of an [`ExportBundle`].
//!
//! Vertex colors are written with the common `v x y z r g b` extension. Each
//! material group gets a `usemtl` line right before its first face. Face
//! indices are 1-based and reference position, UV and normal with the same
//! index since all attributes are per vertex.

use std::fmt::Write as _;

use crate::bundle::{ExportBundle, MaterialGroup};

/// Serialization options.
#[derive(Debug, Clone, Default)]
pub struct ObjOptions {
    /// Base name of the export; the MTL is `<name>.mtl` and textures live under
    /// `<name>/texture<index>.png`.
    pub name: String,
    /// Write an `mtllib` reference and a material library with texture maps.
    pub with_materials: bool,
}

/// Serialized documents for one export.
#[derive(Debug, Clone)]
pub struct ObjDocument {
    pub obj: String,
    pub mtl: Option<String>,
}

/// Path of the re-hosted texture for a group, relative to the OBJ.
pub fn texture_path(name: &str, stroke_index: usize) -> String {
    format!("{}/texture{}.png", name, stroke_index)
}

/// Serialize a bundle to OBJ, plus MTL when materials are requested.
pub fn serialize(bundle: &ExportBundle, options: &ObjOptions) -> ObjDocument {
    let mut obj = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(obj, "# polywrap OBJ export");
    let _ = writeln!(
        obj,
        "# {} vertices, {} faces, {} groups",
        bundle.vertex_count(),
        bundle.face_count(),
        bundle.groups.len()
    );
    if options.with_materials {
        let _ = writeln!(obj, "mtllib {}.mtl", options.name);
    }

    for (position, color) in bundle.vertices.iter().zip(&bundle.colors) {
        let _ = writeln!(
            obj,
            "v {} {} {} {} {} {}",
            position.x, position.y, position.z, color[0], color[1], color[2]
        );
    }
    for normal in &bundle.normals {
        let _ = writeln!(obj, "vn {} {} {}", normal.x, normal.y, normal.z);
    }
    for uv in &bundle.uvs {
        let _ = writeln!(obj, "vt {} {}", uv.x, uv.y);
    }

    for group in &bundle.groups {
        let _ = writeln!(obj, "usemtl {}", group.label);
        for face in &bundle.faces[group.faces.clone()] {
            let [a, b, c] = face.map(|i| i + 1);
            let _ = writeln!(obj, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}");
        }
    }

    let mtl = options
        .with_materials
        .then(|| write_material_library(&bundle.groups, &options.name));

    ObjDocument { obj, mtl }
}

fn write_material_library(groups: &[MaterialGroup], name: &str) -> String {
    let mut mtl = String::new();
    for group in groups {
        let _ = writeln!(mtl, "newmtl {}", group.label);
        let _ = writeln!(mtl, "Ns 10.0000");
        let _ = writeln!(mtl, "Ni 1.5000");
        let _ = writeln!(mtl, "d 0.5");
        let _ = writeln!(mtl, "Tr 0.0000");
        let _ = writeln!(mtl, "Tf 1.0000 1.0000 1.0000");
        let _ = writeln!(mtl, "illum 2");
        let _ = writeln!(mtl, "Ka 0.00 0.00 0.00");
        let _ = writeln!(mtl, "Kd 0.5880 0.5880 0.5880");
        let _ = writeln!(mtl, "Ks 0.0000 0.0000 0.0000");
        let _ = writeln!(mtl, "Ke 0.0000 0.0000 0.0000");
        if group.texture.is_some() {
            let texture = texture_path(name, group.stroke_index);
            let _ = writeln!(mtl, "map_Ka {}", texture);
            let _ = writeln!(mtl, "map_Kd {}", texture);
            let _ = writeln!(mtl, "map_d {}", texture);
        }
        mtl.push('\n');
    }
    mtl
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::build_export_bundle;
    use crate::ribbon::GeometryMode;
    use crate::stroke::Stroke;
    use glam::Vec3;

    fn bundle(textured: bool) -> ExportBundle {
        let strokes: Vec<Stroke> = (0..2)
            .map(|s| {
                let points = (0..3).map(|i| Vec3::new(i as f32, s as f32, 0.0)).collect();
                let stroke = Stroke::new(points, vec![Vec3::Y; 3], vec![0.1; 3]);
                if textured {
                    stroke.with_texture(format!("https://example.com/{}.png", s))
                } else {
                    stroke
                }
            })
            .collect();
        build_export_bundle(&strokes, GeometryMode::Lenient).unwrap()
    }

    fn count_prefix(text: &str, prefix: &str) -> usize {
        text.lines().filter(|l| l.starts_with(prefix)).count()
    }

    #[test]
    fn test_obj_block_counts() {
        let doc = serialize(&bundle(false), &ObjOptions::default());
        assert_eq!(count_prefix(&doc.obj, "v "), 12);
        assert_eq!(count_prefix(&doc.obj, "vn "), 12);
        assert_eq!(count_prefix(&doc.obj, "vt "), 12);
        assert_eq!(count_prefix(&doc.obj, "f "), 16);
        assert_eq!(count_prefix(&doc.obj, "usemtl "), 2);
        assert_eq!(count_prefix(&doc.obj, "mtllib "), 0);
        assert!(doc.mtl.is_none());
    }

    #[test]
    fn test_usemtl_precedes_group_faces() {
        let doc = serialize(&bundle(false), &ObjOptions::default());
        let lines: Vec<&str> = doc.obj.lines().collect();
        let first = lines.iter().position(|l| *l == "usemtl polyline0").unwrap();
        let second = lines.iter().position(|l| *l == "usemtl polyline1").unwrap();

        assert!(lines[first + 1].starts_with("f "));
        assert_eq!(second - first - 1, 8);
        assert!(lines[second + 1..].iter().all(|l| l.starts_with("f ")));
    }

    #[test]
    fn test_face_indices_are_one_based_and_in_range() {
        let doc = serialize(&bundle(false), &ObjOptions::default());
        let vertex_count = count_prefix(&doc.obj, "v ");
        for line in doc.obj.lines().filter(|l| l.starts_with("f ")) {
            for corner in line[2..].split_whitespace() {
                let index: usize = corner.split('/').next().unwrap().parse().unwrap();
                assert!(index >= 1 && index <= vertex_count, "bad index in {}", line);
            }
        }
        assert!(doc.obj.contains("\nf 1/1/1 2/2/2 3/3/3\n"));
    }

    #[test]
    fn test_material_library() {
        let options = ObjOptions {
            name: "wrap3".to_string(),
            with_materials: true,
        };
        let doc = serialize(&bundle(true), &options);
        assert!(doc.obj.contains("mtllib wrap3.mtl"));

        let mtl = doc.mtl.unwrap();
        assert_eq!(count_prefix(&mtl, "newmtl "), 2);
        assert!(mtl.contains("newmtl polyline1"));
        assert!(mtl.contains("map_Kd wrap3/texture0.png"));
        assert!(mtl.contains("map_d wrap3/texture1.png"));
    }

    #[test]
    fn test_material_library_without_textures() {
        let options = ObjOptions {
            name: "wrap1".to_string(),
            with_materials: true,
        };
        let mtl = serialize(&bundle(false), &options).mtl.unwrap();
        assert_eq!(count_prefix(&mtl, "newmtl "), 2);
        assert_eq!(count_prefix(&mtl, "map_"), 0);
    }
}
