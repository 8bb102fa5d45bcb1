//! Object instances
//!
//! Every instance is the same model at a different translation with one
//! shared scale. When rotation is on, all instances spin about one shared
//! axis by `elapsed_seconds * rotation_rate` radians.

use crate::config::SceneSettings;
use crate::foundation::math::{translate_scale_rotate, Mat4, Unit, Vec3};

/// Time-driven pose applied to every instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstanceAnimation {
    /// No rotation
    Static,
    /// Rotate by `elapsed_seconds * rate` about the shared axis
    Rotating {
        /// Absolute time since startup
        elapsed_seconds: f32,
    },
}

/// Immutable set of instance translations with shared scale and rotation
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInstances {
    positions: Vec<Vec3>,
    scale: f32,
    rotation_axis: Unit<Vec3>,
    rotation_rate: f32,
}

impl ObjectInstances {
    /// Build from explicit parts; the axis is normalized
    pub fn new(positions: Vec<Vec3>, scale: f32, rotation_axis: Vec3, rotation_rate: f32) -> Self {
        Self {
            positions,
            scale,
            rotation_axis: Unit::new_normalize(rotation_axis),
            rotation_rate,
        }
    }

    /// Build from the scene configuration
    pub fn from_settings(settings: &SceneSettings) -> Self {
        let [ax, ay, az] = settings.rotation_axis;
        Self::new(
            settings
                .object_positions
                .iter()
                .map(|&[x, y, z]| Vec3::new(x, y, z))
                .collect(),
            settings.object_scale,
            Vec3::new(ax, ay, az),
            settings.rotation_rate,
        )
    }

    /// Translations in draw order
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Number of instances
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether there are no instances
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// `translate * scale * rotate` for instance `index`
    pub fn model_matrix(&self, index: usize, animation: InstanceAnimation) -> Option<Mat4> {
        let position = self.positions.get(index)?;
        Some(self.model_for(position, animation))
    }

    /// Model matrices for every instance, in draw order
    pub fn model_matrices(&self, animation: InstanceAnimation) -> impl Iterator<Item = Mat4> + '_ {
        self.positions
            .iter()
            .map(move |position| self.model_for(position, animation))
    }

    fn model_for(&self, position: &Vec3, animation: InstanceAnimation) -> Mat4 {
        let rotation = match animation {
            InstanceAnimation::Static => None,
            InstanceAnimation::Rotating { elapsed_seconds } => {
                Some((elapsed_seconds * self.rotation_rate, &self.rotation_axis))
            }
        };
        translate_scale_rotate(position, self.scale, rotation)
    }
}

impl Default for ObjectInstances {
    fn default() -> Self {
        Self::from_settings(&SceneSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_grid() {
        let instances = ObjectInstances::default();
        assert_eq!(instances.len(), 9);
        assert_eq!(instances.positions()[0], Vec3::new(-5.0, 0.0, -8.0));
        assert_eq!(instances.positions()[1], Vec3::new(0.0, 0.0, -8.0));
        assert_eq!(instances.positions()[3], Vec3::new(-5.0, 0.0, 0.0));
        assert_eq!(instances.positions()[8], Vec3::new(5.0, 0.0, 8.0));
    }

    #[test]
    fn test_static_model_is_translate_scale() {
        let instances = ObjectInstances::default();
        let model = instances.model_matrix(4, InstanceAnimation::Static).unwrap();
        let expected = Mat4::new_translation(&Vec3::zeros()) * Mat4::new_scaling(0.05);
        assert_relative_eq!(model, expected);
        assert!(instances.model_matrix(9, InstanceAnimation::Static).is_none());
    }

    #[test]
    fn test_rotation_uses_elapsed_time_and_rate() {
        let instances = ObjectInstances::default();
        let t = 2.5;
        let model = instances
            .model_matrix(0, InstanceAnimation::Rotating { elapsed_seconds: t })
            .unwrap();
        let axis = Unit::new_normalize(Vec3::new(-0.5, -0.6, 0.8));
        let expected = Mat4::new_translation(&Vec3::new(-5.0, 0.0, -8.0))
            * Mat4::new_scaling(0.05)
            * Mat4::from_axis_angle(&axis, t * -0.4);
        assert_relative_eq!(model, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_time_rotation_equals_static() {
        let instances = ObjectInstances::default();
        let rotating: Vec<Mat4> = instances
            .model_matrices(InstanceAnimation::Rotating { elapsed_seconds: 0.0 })
            .collect();
        let fixed: Vec<Mat4> = instances.model_matrices(InstanceAnimation::Static).collect();
        for (a, b) in rotating.iter().zip(&fixed) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }
}
