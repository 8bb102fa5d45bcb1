//! Shader program handle
//!
//! Wraps a linked program with named uniform setters, including indexed
//! names such as `pointLights[3].Color`.

use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};
use crate::render::api::{GraphicsDevice, ProgramId, UniformValue};
use crate::render::{RenderError, RenderResult};

/// A preprocessor define injected after the `#version` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDefine {
    /// Macro name
    pub name: String,
    /// Replacement text
    pub value: String,
}

impl ShaderDefine {
    /// Create a define
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// Linked shader program
#[derive(Debug)]
pub struct Shader {
    program: ProgramId,
    label: String,
}

impl Shader {
    /// Compile and link a program from in-memory sources
    pub fn from_sources(
        device: &mut dyn GraphicsDevice,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
        defines: &[ShaderDefine],
    ) -> RenderResult<Self> {
        let vertex = inject_defines(vertex_source, defines);
        let fragment = inject_defines(fragment_source, defines);
        let program = device.create_program(label, &vertex, &fragment)?;
        log::debug!("Linked shader program '{label}'");
        Ok(Self {
            program,
            label: label.to_string(),
        })
    }

    /// Program handle
    pub const fn program(&self) -> ProgramId {
        self.program
    }

    /// Name used in logs and errors
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Make this the program in use
    pub fn activate(&self, device: &mut dyn GraphicsDevice) {
        device.use_program(Some(self.program));
    }

    /// Whether the program exposes an active uniform called `name`
    pub fn has_uniform(&self, device: &mut dyn GraphicsDevice, name: &str) -> bool {
        device.has_uniform(self.program, name)
    }

    /// Set an `int` or sampler uniform
    pub fn set_int(&self, device: &mut dyn GraphicsDevice, name: &str, value: i32) {
        device.set_uniform(self.program, name, UniformValue::Int(value));
    }

    /// Set a `float` uniform
    pub fn set_float(&self, device: &mut dyn GraphicsDevice, name: &str, value: f32) {
        device.set_uniform(self.program, name, UniformValue::Float(value));
    }

    /// Set a `vec2` uniform
    pub fn set_vec2(&self, device: &mut dyn GraphicsDevice, name: &str, value: &Vec2) {
        device.set_uniform(self.program, name, UniformValue::Vec2(*value));
    }

    /// Set a `vec3` uniform
    pub fn set_vec3(&self, device: &mut dyn GraphicsDevice, name: &str, value: &Vec3) {
        device.set_uniform(self.program, name, UniformValue::Vec3(*value));
    }

    /// Set a `vec4` uniform
    pub fn set_vec4(&self, device: &mut dyn GraphicsDevice, name: &str, value: &Vec4) {
        device.set_uniform(self.program, name, UniformValue::Vec4(*value));
    }

    /// Set a `mat4` uniform
    pub fn set_mat4(&self, device: &mut dyn GraphicsDevice, name: &str, value: &Mat4) {
        device.set_uniform(self.program, name, UniformValue::Mat4(*value));
    }

    /// Free the program
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.delete_program(self.program);
    }
}

/// Read one GLSL file; a missing file is [`RenderError::ShaderSource`]
pub(crate) fn read_source(path: &str) -> RenderResult<String> {
    std::fs::read_to_string(path).map_err(|source| RenderError::ShaderSource {
        path: path.to_string(),
        source,
    })
}

/// Insert `#define` lines right after the `#version` directive
///
/// Existing defines of the same names are dropped so the injected value wins.
pub fn inject_defines(source: &str, defines: &[ShaderDefine]) -> String {
    if defines.is_empty() {
        return source.to_string();
    }

    let injected: String = defines
        .iter()
        .map(|d| format!("#define {} {}\n", d.name, d.value))
        .collect();

    let mut output = String::with_capacity(source.len() + injected.len());
    let mut inserted = false;
    let has_version = source
        .lines()
        .any(|line| line.trim_start().starts_with("#version"));

    if !has_version {
        output.push_str(&injected);
        inserted = true;
    }

    for line in source.lines() {
        if is_define_of(line, defines) {
            continue;
        }
        output.push_str(line);
        output.push('\n');
        if !inserted && line.trim_start().starts_with("#version") {
            output.push_str(&injected);
            inserted = true;
        }
    }

    output
}

fn is_define_of(line: &str, defines: &[ShaderDefine]) -> bool {
    let mut tokens = line.split_whitespace();
    tokens.next() == Some("#define")
        && tokens
            .next()
            .is_some_and(|name| defines.iter().any(|d| d.name == name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_follows_version_line() {
        let source = "#version 330 core\nlayout (location = 0) in vec3 aPos;\nvoid main() {}\n";
        let out = inject_defines(source, &[ShaderDefine::new("NR_POINT_LIGHTS", 14)]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "#version 330 core");
        assert_eq!(lines[1], "#define NR_POINT_LIGHTS 14");
        assert_eq!(lines[2], "layout (location = 0) in vec3 aPos;");
    }

    #[test]
    fn test_existing_define_is_replaced() {
        let source = "#version 330 core\n#define NR_POINT_LIGHTS 4\nvoid main() {}\n";
        let out = inject_defines(source, &[ShaderDefine::new("NR_POINT_LIGHTS", 32)]);
        assert_eq!(out.matches("#define NR_POINT_LIGHTS").count(), 1);
        assert!(out.contains("#define NR_POINT_LIGHTS 32"));
    }

    #[test]
    fn test_source_without_version_gets_prefix() {
        let out = inject_defines("void main() {}", &[ShaderDefine::new("N", 2)]);
        assert!(out.starts_with("#define N 2\n"));
    }
}
