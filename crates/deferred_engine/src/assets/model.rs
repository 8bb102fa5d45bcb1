//! GPU-resident textured model
//!
//! A [`Model`] owns one vertex array per OBJ mesh plus every texture its
//! materials reference. A material without a map gets a 1×1 texture of its
//! `Kd`, `Ks` or `Ke` colour. Meshes with no usable material fall back to
//! white diffuse, black specular and black emission.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::assets::{AssetError, ImageData, MtlData, MtlParser, ObjLoader, ObjModel};
use crate::foundation::math::Vec3;
use crate::render::api::{
    Drawable, GraphicsDevice, PrimitiveTopology, TextureDescriptor, TextureId,
    VertexArrayDescriptor, VertexArrayId,
};
use crate::render::shader::Shader;

/// Sampler names and units a material binds to
pub const MATERIAL_SAMPLERS: [(&str, u32); 3] = [
    ("texture_diffuse1", 0),
    ("texture_specular1", 1),
    ("texture_emission1", 2),
];

#[derive(Debug, Clone, Copy)]
struct MaterialTextures {
    diffuse: TextureId,
    specular: TextureId,
    emission: TextureId,
}

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

/// Opaque RGBA8 texel for a linear `[0, 1]` colour
fn texel(color: &Vec3) -> [u8; 4] {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    [channel(color.x), channel(color.y), channel(color.z), 255]
}

/// Textures uploaded so far, keyed by file path or by solid colour
#[derive(Default)]
struct TextureCache {
    files: HashMap<PathBuf, TextureId>,
    solids: HashMap<[u8; 4], TextureId>,
}

impl MaterialTextures {
    const fn in_unit_order(self) -> [TextureId; 3] {
        [self.diffuse, self.specular, self.emission]
    }
}

#[derive(Debug)]
struct ModelMesh {
    vertex_array: VertexArrayId,
    textures: MaterialTextures,
}

/// Loaded model ready to draw
#[derive(Debug)]
pub struct Model {
    meshes: Vec<ModelMesh>,
    textures: Vec<TextureId>,
}

impl Model {
    /// Load an OBJ file, its material libraries and their textures
    pub fn load(device: &mut dyn GraphicsDevice, path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let obj = ObjLoader::load_obj(path)?;
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut materials = HashMap::new();
        for library in &obj.material_libraries {
            let library_path = directory.join(library);
            match std::fs::read_to_string(&library_path) {
                Ok(contents) => materials.extend(MtlParser::parse(&contents)?),
                Err(err) => log::warn!(
                    "Material library {} unreadable ({err}); using fallback textures",
                    library_path.display()
                ),
            }
        }

        let model = Self::from_obj(device, &obj, &materials, &directory)?;
        log::info!(
            "Loaded model {}: {} meshes, {} textures",
            path.display(),
            model.meshes.len(),
            model.textures.len()
        );
        Ok(model)
    }

    /// Upload parsed geometry and materials
    ///
    /// Texture paths are resolved against `texture_dir`; each file is uploaded
    /// once however many materials name it. On error every object created so
    /// far is released.
    pub fn from_obj(
        device: &mut dyn GraphicsDevice,
        obj: &ObjModel,
        materials: &HashMap<String, MtlData>,
        texture_dir: &Path,
    ) -> Result<Self, AssetError> {
        let mut model = Self {
            meshes: Vec::with_capacity(obj.meshes.len()),
            textures: Vec::new(),
        };
        match model.upload(device, obj, materials, texture_dir) {
            Ok(()) => Ok(model),
            Err(err) => {
                model.destroy(device);
                Err(err)
            }
        }
    }

    fn upload(
        &mut self,
        device: &mut dyn GraphicsDevice,
        obj: &ObjModel,
        materials: &HashMap<String, MtlData>,
        texture_dir: &Path,
    ) -> Result<(), AssetError> {
        let mut cache = TextureCache::default();
        let fallback = MaterialTextures {
            diffuse: self.solid(device, &mut cache, WHITE)?,
            specular: self.solid(device, &mut cache, BLACK)?,
            emission: self.solid(device, &mut cache, BLACK)?,
        };

        let mut resolved: HashMap<&str, MaterialTextures> = HashMap::new();

        for mesh in &obj.meshes {
            let textures = match mesh.material.as_deref() {
                Some(name) if resolved.contains_key(name) => resolved[name],
                Some(name) => {
                    let textures = match materials.get(name) {
                        Some(material) => MaterialTextures {
                            diffuse: self.map_or_color(device, &mut cache, texture_dir, material.diffuse_map.as_deref(), &material.diffuse)?,
                            specular: self.map_or_color(device, &mut cache, texture_dir, material.specular_map.as_deref(), &material.specular)?,
                            emission: self.map_or_color(device, &mut cache, texture_dir, material.emission_map.as_deref(), &material.emission)?,
                        },
                        None => {
                            log::warn!("Material '{name}' not defined; using fallback textures");
                            fallback
                        }
                    };
                    resolved.insert(name, textures);
                    textures
                }
                None => fallback,
            };

            let vertex_array = device
                .create_vertex_array(&VertexArrayDescriptor {
                    vertices: &mesh.vertices,
                    indices: Some(&mesh.indices),
                    attribute_components: &[3, 3, 2],
                    topology: PrimitiveTopology::Triangles,
                })
                .map_err(|e| AssetError::LoadFailed(e.to_string()))?;
            self.meshes.push(ModelMesh {
                vertex_array,
                textures,
            });
        }
        Ok(())
    }

    /// The texture for `map`, or a solid texture of `color` when there is no map
    fn map_or_color(
        &mut self,
        device: &mut dyn GraphicsDevice,
        cache: &mut TextureCache,
        texture_dir: &Path,
        map: Option<&str>,
        color: &Vec3,
    ) -> Result<TextureId, AssetError> {
        let Some(map) = map else {
            return self.solid(device, cache, texel(color));
        };
        let path = texture_dir.join(map);
        if let Some(&texture) = cache.files.get(&path) {
            return Ok(texture);
        }
        let texture = self.upload_image(device, &ImageData::from_file(&path)?)?;
        cache.files.insert(path, texture);
        Ok(texture)
    }

    fn solid(
        &mut self,
        device: &mut dyn GraphicsDevice,
        cache: &mut TextureCache,
        color: [u8; 4],
    ) -> Result<TextureId, AssetError> {
        if let Some(&texture) = cache.solids.get(&color) {
            return Ok(texture);
        }
        let texture = self.upload_image(device, &ImageData::solid_color(1, 1, color))?;
        cache.solids.insert(color, texture);
        Ok(texture)
    }

    fn upload_image(&mut self, device: &mut dyn GraphicsDevice, image: &ImageData) -> Result<TextureId, AssetError> {
        // Rows are stored top-down; OBJ texture V was flipped to match
        let texture = device
            .create_texture(&TextureDescriptor::image_rgba8(image.extent(), &image.data))
            .map_err(|e| AssetError::LoadFailed(e.to_string()))?;
        self.textures.push(texture);
        Ok(texture)
    }

    /// Number of meshes
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Number of textures owned, solid colours included
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Release every GPU object
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        for mesh in self.meshes {
            device.delete_vertex_array(mesh.vertex_array);
        }
        for texture in self.textures {
            device.delete_texture(texture);
        }
    }
}

impl Drawable for Model {
    fn draw(&self, device: &mut dyn GraphicsDevice, shader: &Shader) {
        for (name, unit) in MATERIAL_SAMPLERS {
            shader.set_int(device, name, unit as i32);
        }
        for mesh in &self.meshes {
            for ((_, unit), texture) in MATERIAL_SAMPLERS.iter().zip(mesh.textures.in_unit_order()) {
                device.set_active_texture_unit(*unit);
                device.bind_texture_2d(Some(texture));
            }
            device.set_active_texture_unit(0);
            device.draw(mesh.vertex_array);
        }
    }
}
