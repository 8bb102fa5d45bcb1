//! OBJ file loader for 3D models
//!
//! Produces one [`ObjMesh`] per `usemtl` run with interleaved
//! position/normal/uv vertices (8 floats each). Polygons are fan-triangulated
//! and texture V is flipped to match OpenGL's bottom-up image rows.

use std::fs;
use std::path::Path;

use crate::assets::AssetError;

/// Floats per vertex: position (3), normal (3), uv (2)
pub const VERTEX_STRIDE: usize = 8;

/// Triangles sharing one material
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjMesh {
    /// Material named by the active `usemtl`, if any
    pub material: Option<String>,
    /// Interleaved vertices
    pub vertices: Vec<f32>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

impl ObjMesh {
    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }
}

/// Parsed OBJ file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjModel {
    /// Meshes in file order
    pub meshes: Vec<ObjMesh>,
    /// Material libraries named by `mtllib`, relative to the OBJ file
    pub material_libraries: Vec<String>,
}

/// Wavefront OBJ loader
pub struct ObjLoader;

impl ObjLoader {
    /// Load and parse an OBJ file
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<ObjModel, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("obj") => {}
            _ => return Err(AssetError::UnsupportedFormat(path.display().to_string())),
        }
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse OBJ text
    pub fn parse(contents: &str) -> Result<ObjModel, AssetError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut normals: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut model = ObjModel::default();
        let mut current = ObjMesh::default();

        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(command) = parts.next() else {
                continue;
            };
            let args: Vec<&str> = parts.collect();

            match command {
                "v" => positions.push(parse_floats(&args, line_num)?),
                "vn" => normals.push(parse_floats(&args, line_num)?),
                "vt" => {
                    let [u, v] = parse_floats(&args, line_num)?;
                    tex_coords.push([u, 1.0 - v]);
                }
                "f" => {
                    if args.len() < 3 {
                        return Err(invalid(line_num, "face with fewer than 3 vertices"));
                    }
                    let base = current.vertex_count() as u32;
                    for corner in &args {
                        let vertex = resolve_corner(corner, &positions, &normals, &tex_coords, line_num)?;
                        current.vertices.extend_from_slice(&vertex);
                    }
                    for i in 1..args.len() as u32 - 1 {
                        current.indices.extend_from_slice(&[base, base + i, base + i + 1]);
                    }
                }
                "usemtl" => {
                    let name = args.join(" ");
                    if current.material.as_deref() != Some(name.as_str()) {
                        let finished = std::mem::take(&mut current);
                        if !finished.indices.is_empty() {
                            model.meshes.push(finished);
                        }
                        current.material = Some(name);
                    }
                }
                "mtllib" => model.material_libraries.push(args.join(" ")),
                _ => {}
            }
        }

        if !current.indices.is_empty() {
            model.meshes.push(current);
        }
        if model.meshes.is_empty() {
            return Err(AssetError::InvalidData("No faces found in OBJ file".to_string()));
        }

        log::debug!(
            "Parsed OBJ: {} meshes, {} positions",
            model.meshes.len(),
            positions.len()
        );
        Ok(model)
    }
}

fn invalid(line_num: usize, message: &str) -> AssetError {
    AssetError::InvalidData(format!("OBJ line {}: {message}", line_num + 1))
}

fn parse_floats<const N: usize>(args: &[&str], line_num: usize) -> Result<[f32; N], AssetError> {
    let mut out = [0.0; N];
    if args.len() < N {
        return Err(invalid(line_num, &format!("expected {N} components")));
    }
    for (slot, token) in out.iter_mut().zip(args) {
        *slot = token
            .parse()
            .map_err(|_| invalid(line_num, &format!("invalid number '{token}'")))?;
    }
    Ok(out)
}

/// Resolve a 1-based (or negative, relative) OBJ index
fn resolve_index(token: &str, len: usize, line_num: usize) -> Result<usize, AssetError> {
    let raw: i64 = token
        .parse()
        .map_err(|_| invalid(line_num, &format!("invalid index '{token}'")))?;
    let index = match raw {
        0 => None,
        r if r > 0 => Some(r - 1),
        r => Some(len as i64 + r),
    };
    index
        .filter(|&i| i >= 0 && (i as usize) < len)
        .map(|i| i as usize)
        .ok_or_else(|| invalid(line_num, &format!("index {raw} out of bounds")))
}

/// `v`, `v/vt`, `v//vn` or `v/vt/vn`
fn resolve_corner(
    corner: &str,
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
    line_num: usize,
) -> Result<[f32; VERTEX_STRIDE], AssetError> {
    let mut fields = corner.split('/');
    let position = fields
        .next()
        .map(|t| resolve_index(t, positions.len(), line_num))
        .transpose()?
        .map(|i| positions[i])
        .ok_or_else(|| invalid(line_num, "face corner without a position"))?;
    let tex_coord = match fields.next() {
        Some(t) if !t.is_empty() => tex_coords[resolve_index(t, tex_coords.len(), line_num)?],
        _ => [0.0, 0.0],
    };
    let normal = match fields.next() {
        Some(t) if !t.is_empty() => normals[resolve_index(t, normals.len(), line_num)?],
        _ => [0.0, 1.0, 0.0],
    };

    Ok([
        position[0],
        position[1],
        position[2],
        normal[0],
        normal[1],
        normal[2],
        tex_coord[0],
        tex_coord[1],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
mtllib quad.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 1
vn 0 0 1
usemtl Panel
f 1/1/1 2/1/1 3/2/1 4/2/1
";

    #[test]
    fn test_quad_is_fan_triangulated() {
        let model = ObjLoader::parse(QUAD).unwrap();
        assert_eq!(model.material_libraries, vec!["quad.mtl".to_string()]);
        assert_eq!(model.meshes.len(), 1);

        let mesh = &model.meshes[0];
        assert_eq!(mesh.material.as_deref(), Some("Panel"));
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        // Third corner: position (1,1,0), normal +Z, uv (1, 1 - 1)
        assert_eq!(&mesh.vertices[16..24], &[1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_usemtl_splits_meshes_and_negative_indices_resolve() {
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
usemtl A
f -3 -2 -1
usemtl B
f 1//1 2//1 3//1
vn 0 1 0
";
        // `vn` after use is out of bounds at the time of the face
        assert!(ObjLoader::parse(source).is_err());

        let source = source.replace("vn 0 1 0\n", "").replace("usemtl B", "vn 0 1 0\nusemtl B");
        let model = ObjLoader::parse(&source).unwrap();
        assert_eq!(model.meshes.len(), 2);
        assert_eq!(model.meshes[0].material.as_deref(), Some("A"));
        assert_eq!(model.meshes[1].material.as_deref(), Some("B"));
        assert_eq!(&model.meshes[0].vertices[3..6], &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_file_without_faces_is_rejected() {
        assert!(matches!(
            ObjLoader::parse("v 0 0 0\n"),
            Err(AssetError::InvalidData(_))
        ));
    }

    #[test]
    fn test_missing_and_foreign_files() {
        assert!(matches!(
            ObjLoader::load_obj("no/such/model.obj"),
            Err(AssetError::NotFound(_))
        ));
        let path = std::env::temp_dir().join("deferred_engine_obj_loader_test.fbx");
        std::fs::write(&path, "not an obj").unwrap();
        assert!(matches!(
            ObjLoader::load_obj(&path),
            Err(AssetError::UnsupportedFormat(_))
        ));
        std::fs::remove_file(path).ok();
    }
}
