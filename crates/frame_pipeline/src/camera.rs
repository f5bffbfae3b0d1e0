//! Orbit camera driven by keyboard and mouse state.

use std::f32::consts::FRAC_PI_2;
use std::f32::consts::FRAC_PI_4;
use std::f32::consts::PI;

use bevy_math::Mat4;
use bevy_math::Vec3;

/// What the frame update stage needs from a camera each tick.
pub trait ViewProvider {
    fn view(&self) -> Mat4;
    fn projection(&self) -> Mat4;
    fn eye_position(&self) -> Vec3;
    /// Direction the sun's light travels.
    fn sun_direction(&self) -> Vec3;
    fn near_z(&self) -> f32;
    fn far_z(&self) -> f32;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Key {
    W,
    A,
    S,
    D,
    Left,
    Right,
    Up,
    Down,
}

impl Key {
    const COUNT: usize = 8;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MouseButtons {
    pub left: bool,
    pub right: bool,
}

/// Held keys and mouse buttons, fed from window messages.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    keys: [bool; Key::COUNT],
    pub mouse: MouseButtons,
}

impl InputState {
    pub fn press(&mut self, key: Key) {
        self.keys[key as usize] = true;
    }

    pub fn release(&mut self, key: Key) {
        self.keys[key as usize] = false;
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.keys[key as usize]
    }

    fn axis(&self, negative: Key, positive: Key) -> f32 {
        self.is_down(positive) as i32 as f32 - self.is_down(negative) as i32 as f32
    }
}

const MOVE_SPEED: f32 = 5.0;
const SUN_SPEED: f32 = 1.0;
const ROTATE_PER_PIXEL: f32 = 0.25 * PI / 180.0;
const ZOOM_PER_PIXEL: f32 = 0.005;
const MIN_RADIUS: f32 = 3.0;
const MAX_RADIUS: f32 = 15.0;

/// Spherical camera looking at `offset`, which W/A/S/D slide across the floor.
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    pub theta: f32,
    pub phi: f32,
    pub radius: f32,
    pub offset: Vec3,
    pub sun_theta: f32,
    pub sun_phi: f32,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    last_mouse: Option<(i32, i32)>,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

impl OrbitCamera {
    pub fn new(aspect: f32) -> Self {
        Self {
            theta: 1.5 * PI,
            phi: FRAC_PI_2 - 0.1,
            radius: MAX_RADIUS,
            offset: Vec3::ZERO,
            sun_theta: 1.25 * PI,
            sun_phi: FRAC_PI_4,
            fov_y: 0.25 * PI,
            aspect,
            near: 1.0,
            far: 1000.0,
            last_mouse: None,
        }
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn on_mouse_down(&mut self, x: i32, y: i32) {
        self.last_mouse = Some((x, y));
    }

    pub fn on_mouse_up(&mut self) {
        self.last_mouse = None;
    }

    /// Left drag orbits, right drag zooms.
    pub fn on_mouse_move(&mut self, buttons: MouseButtons, x: i32, y: i32) {
        let (last_x, last_y) = self.last_mouse.unwrap_or((x, y));
        let dx = (x - last_x) as f32;
        let dy = (y - last_y) as f32;
        if buttons.left {
            self.theta += dx * ROTATE_PER_PIXEL;
            self.phi = (self.phi + dy * ROTATE_PER_PIXEL).clamp(0.1, PI - 0.1);
        } else if buttons.right {
            self.radius =
                (self.radius + ZOOM_PER_PIXEL * dx - ZOOM_PER_PIXEL * dy).clamp(MIN_RADIUS, MAX_RADIUS);
        }
        self.last_mouse = Some((x, y));
    }

    /// Apply held keys over `dt` seconds.
    pub fn update(&mut self, input: &InputState, dt: f32) {
        self.sun_theta += input.axis(Key::Left, Key::Right) * SUN_SPEED * dt;
        self.sun_phi =
            (self.sun_phi + input.axis(Key::Up, Key::Down) * SUN_SPEED * dt).clamp(0.1, FRAC_PI_4);
        self.offset.x += input.axis(Key::A, Key::D) * MOVE_SPEED * dt;
        self.offset.z += input.axis(Key::S, Key::W) * MOVE_SPEED * dt;
    }
}

fn spherical_to_cartesian(radius: f32, theta: f32, phi: f32) -> Vec3 {
    Vec3::new(
        radius * phi.sin() * theta.cos(),
        radius * phi.cos(),
        radius * phi.sin() * theta.sin(),
    )
}

impl ViewProvider for OrbitCamera {
    fn view(&self) -> Mat4 {
        Mat4::look_at_lh(self.eye_position(), self.offset, Vec3::Y)
    }

    fn projection(&self) -> Mat4 {
        Mat4::perspective_lh(self.fov_y, self.aspect, self.near, self.far)
    }

    fn eye_position(&self) -> Vec3 {
        spherical_to_cartesian(self.radius, self.theta, self.phi) + self.offset
    }

    fn sun_direction(&self) -> Vec3 {
        -spherical_to_cartesian(1.0, self.sun_theta, self.sun_phi)
    }

    fn near_z(&self) -> f32 {
        self.near
    }

    fn far_z(&self) -> f32 {
        self.far
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn starts_in_front_of_the_scene() {
        let camera = OrbitCamera::default();
        let eye = camera.eye_position();
        assert_relative_eq!(eye.length(), 15.0, epsilon = 1e-4);
        assert!(eye.z < 0.0);
        let origin_in_view = camera.view().transform_point3(Vec3::ZERO);
        assert_relative_eq!(origin_in_view.z, 15.0, epsilon = 1e-4);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = OrbitCamera::default();
        let right = MouseButtons {
            left: false,
            right: true,
        };
        camera.on_mouse_down(0, 0);
        camera.on_mouse_move(right, 0, 10_000);
        assert_eq!(camera.radius, MIN_RADIUS);
        camera.on_mouse_move(right, 10_000, -10_000);
        assert_eq!(camera.radius, MAX_RADIUS);
    }

    #[test]
    fn orbit_keeps_phi_off_the_poles() {
        let mut camera = OrbitCamera::default();
        let left = MouseButtons {
            left: true,
            right: false,
        };
        camera.on_mouse_down(0, 0);
        camera.on_mouse_move(left, 40, -100_000);
        assert_eq!(camera.phi, 0.1);
        assert_relative_eq!(camera.theta, 1.5 * PI + 40.0 * ROTATE_PER_PIXEL);
    }

    #[test]
    fn keys_move_the_target_and_sun() {
        let mut camera = OrbitCamera::default();
        let mut input = InputState::default();
        input.press(Key::W);
        input.press(Key::D);
        input.press(Key::Down);
        camera.update(&input, 0.5);
        assert_relative_eq!(camera.offset.z, 2.5);
        assert_relative_eq!(camera.offset.x, 2.5);
        assert_eq!(camera.sun_phi, FRAC_PI_4);

        input.release(Key::Down);
        input.press(Key::Up);
        camera.update(&input, 10.0);
        assert_eq!(camera.sun_phi, 0.1);
    }

    #[test]
    fn sun_points_down() {
        let camera = OrbitCamera::default();
        assert!(camera.sun_direction().y < 0.0);
        assert_relative_eq!(camera.sun_direction().length(), 1.0, epsilon = 1e-5);
    }
}
