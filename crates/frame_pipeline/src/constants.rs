//! Constant buffer records as the shaders read them.
//!
//! Matrices are stored transposed relative to their row-major CPU layout,
//! which is the column-major packing HLSL expects by default.

use bevy_math::Mat4;
use bevy_math::Vec3;
use bevy_math::Vec4;
use bytemuck::Pod;
use bytemuck::Zeroable;

pub const MAX_LIGHTS: usize = 16;

pub type GpuMatrix = [[f32; 4]; 4];

/// Row-major CPU layout of `m`: `row_major(m)[r][c]` is row `r`, column `c`.
pub fn row_major(m: &Mat4) -> GpuMatrix {
    m.transpose().to_cols_array_2d()
}

/// `m` as written into a constant buffer: the transpose of [`row_major`].
pub fn gpu_matrix(m: &Mat4) -> GpuMatrix {
    m.to_cols_array_2d()
}

const IDENTITY: GpuMatrix = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: GpuMatrix,
    pub tex_transform: GpuMatrix,
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self {
            world: IDENTITY,
            tex_transform: IDENTITY,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub diffuse_albedo: [f32; 4],
    pub fresnel_r0: [f32; 3],
    pub roughness: f32,
    pub base_color: [f32; 4],
    pub ambient_strength: f32,
    pub specular_strength: f32,
    pub _pad: [f32; 2],
    pub mat_transform: GpuMatrix,
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            diffuse_albedo: [1.0; 4],
            fresnel_r0: [0.01; 3],
            roughness: 0.25,
            base_color: [1.0; 4],
            ambient_strength: 1.0,
            specular_strength: 1.0,
            _pad: [0.0; 2],
            mat_transform: IDENTITY,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Light {
    pub strength: [f32; 3],
    pub falloff_start: f32,
    pub direction: [f32; 3],
    pub falloff_end: f32,
    pub position: [f32; 3],
    pub spot_power: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            strength: [0.5, 0.5, 0.5],
            falloff_start: 1.0,
            direction: [0.0, -1.0, 0.0],
            falloff_end: 10.0,
            position: [0.0, 0.0, 0.0],
            spot_power: 64.0,
        }
    }
}

impl Light {
    pub fn directional(direction: Vec3, strength: Vec3) -> Self {
        Self {
            direction: direction.to_array(),
            strength: strength.to_array(),
            ..Default::default()
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub view: GpuMatrix,
    pub inv_view: GpuMatrix,
    pub proj: GpuMatrix,
    pub inv_proj: GpuMatrix,
    pub view_proj: GpuMatrix,
    pub inv_view_proj: GpuMatrix,
    pub eye_pos_w: [f32; 3],
    pub _pad0: f32,
    pub render_target_size: [f32; 2],
    pub inv_render_target_size: [f32; 2],
    pub near_z: f32,
    pub far_z: f32,
    pub total_time: f32,
    pub delta_time: f32,
    pub ambient_light: [f32; 4],
    pub lights: [Light; MAX_LIGHTS],
}

impl Default for PassConstants {
    fn default() -> Self {
        Self {
            view: IDENTITY,
            inv_view: IDENTITY,
            proj: IDENTITY,
            inv_proj: IDENTITY,
            view_proj: IDENTITY,
            inv_view_proj: IDENTITY,
            eye_pos_w: [0.0; 3],
            _pad0: 0.0,
            render_target_size: [0.0; 2],
            inv_render_target_size: [0.0; 2],
            near_z: 0.0,
            far_z: 0.0,
            total_time: 0.0,
            delta_time: 0.0,
            ambient_light: [0.0, 0.0, 0.0, 1.0],
            lights: [Light::default(); MAX_LIGHTS],
        }
    }
}

/// Everything that changes per tick and feeds [`PassConstants`].
#[derive(Clone, Debug)]
pub struct PassInputs {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye_position: Vec3,
    pub render_target_size: (u32, u32),
    pub near_z: f32,
    pub far_z: f32,
    pub total_time: f32,
    pub delta_time: f32,
    pub ambient_light: Vec4,
    pub lights: Vec<Light>,
}

impl PassInputs {
    pub fn to_constants(&self) -> PassConstants {
        let view_proj = self.projection * self.view;
        let (width, height) = (
            self.render_target_size.0.max(1) as f32,
            self.render_target_size.1.max(1) as f32,
        );

        let mut lights = [Light::default(); MAX_LIGHTS];
        for (slot, light) in lights.iter_mut().zip(&self.lights) {
            *slot = *light;
        }

        PassConstants {
            view: gpu_matrix(&self.view),
            inv_view: gpu_matrix(&self.view.inverse()),
            proj: gpu_matrix(&self.projection),
            inv_proj: gpu_matrix(&self.projection.inverse()),
            view_proj: gpu_matrix(&view_proj),
            inv_view_proj: gpu_matrix(&view_proj.inverse()),
            eye_pos_w: self.eye_position.to_array(),
            _pad0: 0.0,
            render_target_size: [width, height],
            inv_render_target_size: [1.0 / width, 1.0 / height],
            near_z: self.near_z,
            far_z: self.far_z,
            total_time: self.total_time,
            delta_time: self.delta_time,
            ambient_light: self.ambient_light.to_array(),
            lights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gpu_layout_is_the_transpose_of_row_major() {
        let m = Mat4::from_cols_array(&[
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0,
            16.0,
        ]);
        let rows = row_major(&m);
        let gpu = gpu_matrix(&m);
        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(gpu[c][r], rows[r][c]);
            }
        }
    }

    #[test]
    fn translation_ends_up_in_the_last_gpu_column() {
        let world = Mat4::from_translation(Vec3::new(-10.0, 5.0, 10.0));
        let gpu = gpu_matrix(&world);
        assert_eq!(gpu[3][0], -10.0);
        assert_eq!(gpu[3][1], 5.0);
        assert_eq!(gpu[3][2], 10.0);
    }

    #[test]
    fn records_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<ObjectConstants>() % 16, 0);
        assert_eq!(std::mem::size_of::<MaterialConstants>() % 16, 0);
        assert_eq!(std::mem::size_of::<Light>(), 48);
        assert_eq!(std::mem::size_of::<PassConstants>() % 16, 0);
    }

    #[test]
    fn pass_inputs_fill_derived_terms() {
        let inputs = PassInputs {
            view: Mat4::look_at_lh(Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO, Vec3::Y),
            projection: Mat4::perspective_lh(0.25 * std::f32::consts::PI, 16.0 / 9.0, 1.0, 1000.0),
            eye_position: Vec3::new(0.0, 0.0, -5.0),
            render_target_size: (1280, 720),
            near_z: 1.0,
            far_z: 1000.0,
            total_time: 2.5,
            delta_time: 0.016,
            ambient_light: Vec4::new(0.25, 0.25, 0.35, 1.0),
            lights: vec![Light::directional(Vec3::NEG_Y, Vec3::new(0.0, 0.9, 0.9))],
        };
        let pass = inputs.to_constants();
        assert_relative_eq!(pass.inv_render_target_size[0], 1.0 / 1280.0);
        assert_relative_eq!(pass.inv_render_target_size[1], 1.0 / 720.0);
        assert_eq!(pass.eye_pos_w, [0.0, 0.0, -5.0]);
        assert_eq!(pass.lights[0].strength, [0.0, 0.9, 0.9]);
        assert_eq!(pass.lights[1], Light::default());

        let view_proj = Mat4::from_cols_array_2d(&pass.view_proj);
        let inv = Mat4::from_cols_array_2d(&pass.inv_view_proj);
        let identity = view_proj * inv;
        for (a, b) in identity.to_cols_array().iter().zip(Mat4::IDENTITY.to_cols_array()) {
            assert_relative_eq!(*a, b, epsilon = 1e-4);
        }
    }
}
