//! Seeded point-light set
//!
//! Lights are generated once from a seed and never change. Each light takes
//! six draws from the generator in the order x, y, z, r, g, b; every draw is
//! an integer in `0..100` scaled into its range, so values are quantized to
//! 1/100 of the span:
//!
//! - x in [-8, 8), y in [-2, 2), z in [-5, 5)
//! - each color channel in [0.1, 0.6)
//!
//! All lights share the attenuation (1.0, 0.5, 1.2).

use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::foundation::math::Vec3;
use crate::render::api::GraphicsDevice;
use crate::render::shader::Shader;
use crate::render::{RenderError, RenderResult};

/// Constant attenuation term
pub const ATTENUATION_CONSTANT: f32 = 1.0;
/// Linear attenuation term
pub const ATTENUATION_LINEAR: f32 = 0.5;
/// Quadratic attenuation term
pub const ATTENUATION_QUADRATIC: f32 = 1.2;

/// A point light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// World-space position
    pub position: Vec3,
    /// Linear RGB color
    pub color: Vec3,
    /// Constant attenuation
    pub constant: f32,
    /// Linear attenuation
    pub linear: f32,
    /// Quadratic attenuation
    pub quadratic: f32,
}

impl PointLight {
    /// Light with the shared attenuation
    pub const fn new(position: Vec3, color: Vec3) -> Self {
        Self {
            position,
            color,
            constant: ATTENUATION_CONSTANT,
            linear: ATTENUATION_LINEAR,
            quadratic: ATTENUATION_QUADRATIC,
        }
    }
}

/// Members of the GLSL `PointLight` struct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightField {
    /// `vec3 Position`
    Position,
    /// `vec3 Color`
    Color,
    /// `float Constant`
    Constant,
    /// `float Linear`
    Linear,
    /// `float Quadratic`
    Quadratic,
}

impl LightField {
    /// Members in upload order
    pub const ALL: [Self; 5] = [Self::Position, Self::Color, Self::Constant, Self::Linear, Self::Quadratic];

    const fn member(self) -> &'static str {
        match self {
            Self::Position => "Position",
            Self::Color => "Color",
            Self::Constant => "Constant",
            Self::Linear => "Linear",
            Self::Quadratic => "Quadratic",
        }
    }
}

/// `pointLights[index].Field`
pub fn light_uniform_name(index: usize, field: LightField) -> String {
    format!("pointLights[{index}].{}", field.member())
}

/// Fixed, ordered set of point lights
#[derive(Debug, Clone, PartialEq)]
pub struct LightSet {
    lights: Vec<PointLight>,
}

impl LightSet {
    /// Generate `count` lights from `seed`
    pub fn generate(count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut draw = |span: f32, min: f32| f32::from(rng.gen_range(0u8..100)) / 100.0 * span + min;

        let lights = (0..count)
            .map(|_| {
                let x = draw(16.0, -8.0);
                let y = draw(4.0, -2.0);
                let z = draw(10.0, -5.0);
                let r = draw(0.5, 0.1);
                let g = draw(0.5, 0.1);
                let b = draw(0.5, 0.1);
                PointLight::new(Vec3::new(x, y, z), Vec3::new(r, g, b))
            })
            .collect();

        info!("Generated {count} point lights from seed {seed}");
        Self { lights }
    }

    /// Lights in generation order
    pub fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    /// Number of lights
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Write every light into the `pointLights` array of the active `shader`
    ///
    /// Exactly five uniforms per light.
    pub fn expose_uniforms(&self, device: &mut dyn GraphicsDevice, shader: &Shader) {
        for (i, light) in self.lights.iter().enumerate() {
            shader.set_vec3(device, &light_uniform_name(i, LightField::Position), &light.position);
            shader.set_vec3(device, &light_uniform_name(i, LightField::Color), &light.color);
            shader.set_float(device, &light_uniform_name(i, LightField::Constant), light.constant);
            shader.set_float(device, &light_uniform_name(i, LightField::Linear), light.linear);
            shader.set_float(device, &light_uniform_name(i, LightField::Quadratic), light.quadratic);
        }
    }

    /// Check that `shader` declares exactly as many lights as the set holds
    pub fn validate_shader_capacity(
        &self,
        device: &mut dyn GraphicsDevice,
        shader: &Shader,
    ) -> RenderResult<()> {
        let count = self.lights.len();
        let last_present = count == 0
            || shader.has_uniform(device, &light_uniform_name(count - 1, LightField::Position));
        let overflow_present =
            shader.has_uniform(device, &light_uniform_name(count, LightField::Position));

        if last_present && !overflow_present {
            Ok(())
        } else {
            Err(RenderError::Configuration(format!(
                "shader '{}' does not declare exactly {count} point lights",
                shader.label()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{Extent2D, UniformValue};
    use crate::render::backends::HeadlessDevice;

    fn lighting_shader(device: &mut HeadlessDevice, declared: usize) -> Shader {
        let vertex = "#version 330 core\nvoid main() { gl_Position = vec4(0.0); }\n";
        let fragment = format!(
            "#version 330 core\nout vec4 FragColor;\n\
             struct PointLight {{ vec3 Position; vec3 Color; float Constant; float Linear; float Quadratic; }};\n\
             uniform PointLight pointLights[{declared}];\n\
             void main() {{ FragColor = vec4(1.0); }}\n"
        );
        let shader = Shader::from_sources(device, "lights", vertex, &fragment, &[]).unwrap();
        shader.activate(device);
        shader
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        for count in [1, 2, 14, 64] {
            let a = LightSet::generate(count, 99);
            let b = LightSet::generate(count, 99);
            assert_eq!(a.len(), count);
            for (la, lb) in a.lights().iter().zip(b.lights()) {
                for i in 0..3 {
                    assert_eq!(la.position[i].to_bits(), lb.position[i].to_bits());
                    assert_eq!(la.color[i].to_bits(), lb.color[i].to_bits());
                }
            }
        }
    }

    #[test]
    fn test_values_stay_in_range_and_quantized() {
        let set = LightSet::generate(200, 7);
        for light in set.lights() {
            let p = light.position;
            assert!((-8.0..8.0).contains(&p.x));
            assert!((-2.0..2.0).contains(&p.y));
            assert!((-5.0..5.0).contains(&p.z));
            for c in light.color.iter() {
                assert!((0.1..0.6).contains(c));
            }
            // x = k / 100 * 16 - 8 for an integer k
            let k = (p.x + 8.0) / 16.0 * 100.0;
            assert!((k - k.round()).abs() < 1e-3);
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        assert_ne!(LightSet::generate(14, 1), LightSet::generate(14, 2));
    }

    #[test]
    fn test_expose_writes_five_uniforms_per_light() {
        let mut device = HeadlessDevice::new(Extent2D::new(4, 4));
        let lights = LightSet::generate(14, 99);
        let shader = lighting_shader(&mut device, 14);
        device.reset_logs();

        lights.expose_uniforms(&mut device, &shader);

        let writes = device.uniform_writes();
        assert_eq!(writes.len(), 5 * 14);
        assert!(writes.iter().all(|w| w.known && w.active));
        for i in 0..14 {
            let get = |field| device.uniform_value(shader.program(), &light_uniform_name(i, field));
            assert_eq!(get(LightField::Constant), Some(UniformValue::Float(1.0)));
            assert_eq!(get(LightField::Linear), Some(UniformValue::Float(0.5)));
            assert_eq!(get(LightField::Quadratic), Some(UniformValue::Float(1.2)));
            assert_eq!(
                get(LightField::Position),
                Some(UniformValue::Vec3(lights.lights()[i].position))
            );
        }
    }

    #[test]
    fn test_capacity_validation() {
        let mut device = HeadlessDevice::new(Extent2D::new(4, 4));
        let lights = LightSet::generate(14, 99);

        let exact = lighting_shader(&mut device, 14);
        assert!(lights.validate_shader_capacity(&mut device, &exact).is_ok());

        let small = lighting_shader(&mut device, 8);
        assert!(matches!(
            lights.validate_shader_capacity(&mut device, &small),
            Err(RenderError::Configuration(_))
        ));

        let large = lighting_shader(&mut device, 32);
        assert!(lights.validate_shader_capacity(&mut device, &large).is_err());
    }
}
