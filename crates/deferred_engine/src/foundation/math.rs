//! Math utilities and types
//!
//! Thin aliases over `nalgebra` plus the OpenGL-convention camera matrices
//! used by every render pass.

pub use nalgebra::{Matrix4, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Right-handed perspective projection mapping depth to [-1, 1]
///
/// `fov_degrees` is the vertical field of view.
pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::new_perspective(aspect, fov_degrees.to_radians(), near, far)
}

/// Right-handed view matrix looking from `eye` toward `target`
pub fn look_at(eye: &Point3, target: &Point3, up: &Vec3) -> Mat4 {
    Mat4::look_at_rh(eye, target, up)
}

/// Model matrix `translate * scale * rotate(angle, axis)`
pub fn translate_scale_rotate(
    translation: &Vec3,
    scale: f32,
    rotation: Option<(f32, &Unit<Vec3>)>,
) -> Mat4 {
    let mut model = Mat4::new_translation(translation) * Mat4::new_scaling(scale);
    if let Some((angle, axis)) = rotation {
        model *= Mat4::from_axis_angle(axis, angle);
    }
    model
}

/// Transform a point by a projective matrix, returning clip coordinates
pub fn to_clip_space(matrix: &Mat4, point: &Point3) -> Vec4 {
    matrix * point.to_homogeneous()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_translate_scale_without_rotation() {
        let model = translate_scale_rotate(&Vec3::new(5.0, 0.0, -8.0), 0.05, None);
        let origin = model.transform_point(&Point3::origin());
        assert_relative_eq!(origin, Point3::new(5.0, 0.0, -8.0));
        assert_relative_eq!(model[(0, 0)], 0.05);
        assert_relative_eq!(model[(1, 1)], 0.05);
        assert_relative_eq!(model[(2, 2)], 0.05);
    }

    #[test]
    fn test_rotation_applied_before_scale_and_translation() {
        let axis = Unit::new_normalize(Vec3::y());
        let angle = std::f32::consts::FRAC_PI_2;
        let model = translate_scale_rotate(&Vec3::new(1.0, 0.0, 0.0), 2.0, Some((angle, &axis)));
        // +X rotated a quarter turn about +Y lands on -Z, then scaled and moved
        let p = model.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(1.0, 0.0, -2.0), epsilon = 1e-5);
    }

    #[test]
    fn test_perspective_maps_near_plane_to_minus_one() {
        let projection = perspective(45.0, 16.0 / 9.0, 0.1, 100.0);
        let clip = to_clip_space(&projection, &Point3::new(0.0, 0.0, -0.1));
        assert_relative_eq!(clip.z / clip.w, -1.0, epsilon = 1e-4);
    }
}
