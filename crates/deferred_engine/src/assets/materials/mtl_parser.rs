//! MTL (Material Template Library) file parser
//!
//! Reads the subset of Wavefront `.mtl` the demo shades with: diffuse,
//! specular and emission colors and their texture maps. Shininess is fixed
//! in the shaders, so `Ns` is ignored.

use std::collections::HashMap;

use crate::assets::AssetError;
use crate::foundation::math::Vec3;

/// One parsed `newmtl` block
#[derive(Debug, Clone, PartialEq)]
pub struct MtlData {
    /// Material name
    pub name: String,
    /// Diffuse color (Kd)
    pub diffuse: Vec3,
    /// Specular color (Ks)
    pub specular: Vec3,
    /// Emission color (Ke)
    pub emission: Vec3,
    /// Diffuse texture map (map_Kd)
    pub diffuse_map: Option<String>,
    /// Specular texture map (map_Ks)
    pub specular_map: Option<String>,
    /// Emission texture map (map_Ke)
    pub emission_map: Option<String>,
}

impl Default for MtlData {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse: Vec3::new(0.8, 0.8, 0.8),
            specular: Vec3::new(0.5, 0.5, 0.5),
            emission: Vec3::zeros(),
            diffuse_map: None,
            specular_map: None,
            emission_map: None,
        }
    }
}

/// MTL file parser
pub struct MtlParser;

impl MtlParser {
    /// Parse MTL file contents into a map of material name to data
    pub fn parse(contents: &str) -> Result<HashMap<String, MtlData>, AssetError> {
        let mut materials = HashMap::new();
        let mut current: Option<MtlData> = None;

        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(command) = tokens.next() else {
                continue;
            };

            if command == "newmtl" {
                if let Some(mat) = current.take() {
                    materials.insert(mat.name.clone(), mat);
                }
                let name = tokens.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err(invalid(line_num, "newmtl missing material name"));
                }
                current = Some(MtlData {
                    name,
                    ..MtlData::default()
                });
                continue;
            }

            // Statements before the first newmtl have nothing to apply to
            let Some(mat) = current.as_mut() else {
                continue;
            };
            match command {
                "Kd" => mat.diffuse = Self::parse_vec3(&mut tokens, line_num, command)?,
                "Ks" => mat.specular = Self::parse_vec3(&mut tokens, line_num, command)?,
                "Ke" => mat.emission = Self::parse_vec3(&mut tokens, line_num, command)?,
                "map_Kd" => mat.diffuse_map = Some(Self::parse_texture_path(tokens, line_num, command)?),
                "map_Ks" => mat.specular_map = Some(Self::parse_texture_path(tokens, line_num, command)?),
                "map_Ke" => mat.emission_map = Some(Self::parse_texture_path(tokens, line_num, command)?),
                _ => {}
            }
        }

        if let Some(mat) = current {
            materials.insert(mat.name.clone(), mat);
        }
        Ok(materials)
    }

    fn parse_vec3<'a>(
        tokens: &mut impl Iterator<Item = &'a str>,
        line_num: usize,
        command: &str,
    ) -> Result<Vec3, AssetError> {
        let r = Self::parse_f32(tokens, line_num, command)?;
        let g = Self::parse_f32(tokens, line_num, command)?;
        let b = Self::parse_f32(tokens, line_num, command)?;
        Ok(Vec3::new(r, g, b))
    }

    fn parse_f32<'a>(
        tokens: &mut impl Iterator<Item = &'a str>,
        line_num: usize,
        command: &str,
    ) -> Result<f32, AssetError> {
        let token = tokens
            .next()
            .ok_or_else(|| invalid(line_num, &format!("{command} missing value")))?;
        token
            .parse::<f32>()
            .map_err(|_| invalid(line_num, &format!("{command} invalid float value '{token}'")))
    }

    /// Texture paths may contain spaces; options such as `-bm 1.0` are skipped
    fn parse_texture_path<'a>(
        tokens: impl Iterator<Item = &'a str>,
        line_num: usize,
        command: &str,
    ) -> Result<String, AssetError> {
        let tokens: Vec<&str> = tokens.collect();
        let mut start = 0;
        while start < tokens.len() && tokens[start].starts_with('-') {
            start += 2;
        }
        let path = tokens.get(start..).unwrap_or_default().join(" ");
        if path.is_empty() {
            return Err(invalid(line_num, &format!("{command} missing texture path")));
        }
        Ok(path.replace('\\', "/"))
    }
}

fn invalid(line_num: usize, message: &str) -> AssetError {
    AssetError::InvalidData(format!("MTL line {}: {message}", line_num + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_material() {
        let mtl_content = r"
# Simple material
newmtl TestMaterial
Ka 1.0 1.0 1.0
Kd 0.8 0.2 0.2
Ks 0.5 0.5 0.5
Ns 250.0
illum 2
";

        let materials = MtlParser::parse(mtl_content).unwrap();
        assert_eq!(materials.len(), 1);

        let mat = &materials["TestMaterial"];
        assert_eq!(mat.diffuse, Vec3::new(0.8, 0.2, 0.2));
        assert_eq!(mat.specular, Vec3::new(0.5, 0.5, 0.5));
        assert_eq!(mat.diffuse_map, None);
    }

    #[test]
    fn test_parse_material_maps() {
        let mtl_content = r"
newmtl Hull
map_Kd textures/hull diffuse.png
map_Ks -bm 0.5 textures\hull_spec.png
map_Ke textures/hull_emission.png
";

        let materials = MtlParser::parse(mtl_content).unwrap();
        let mat = &materials["Hull"];
        assert_eq!(mat.diffuse_map.as_deref(), Some("textures/hull diffuse.png"));
        assert_eq!(mat.specular_map.as_deref(), Some("textures/hull_spec.png"));
        assert_eq!(mat.emission_map.as_deref(), Some("textures/hull_emission.png"));
    }

    #[test]
    fn test_parse_multiple_materials() {
        let mtl_content = r"
newmtl Material1
Kd 1.0 0.0 0.0

newmtl Material2
Kd 0.0 1.0 0.0
";

        let materials = MtlParser::parse(mtl_content).unwrap();
        assert_eq!(materials.len(), 2);
        assert_eq!(materials["Material1"].diffuse, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(materials["Material2"].diffuse, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_bad_value_reports_line() {
        let result = MtlParser::parse("newmtl A\nKd 1.0 oops 0.0\n");
        match result {
            Err(AssetError::InvalidData(message)) => assert!(message.contains("line 2")),
            other => panic!("expected invalid data, got {other:?}"),
        }
    }
}
