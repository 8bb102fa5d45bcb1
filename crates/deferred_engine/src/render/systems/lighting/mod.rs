//! Point lighting

pub mod lighting;

pub use lighting::{
    light_uniform_name, LightField, LightSet, PointLight, ATTENUATION_CONSTANT, ATTENUATION_LINEAR,
    ATTENUATION_QUADRATIC,
};
