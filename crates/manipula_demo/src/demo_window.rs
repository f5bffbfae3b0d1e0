use frame_pipeline::InputState;
use frame_pipeline::OrbitCamera;
use tracing::debug;
use windows::core::w;
use windows::core::PCWSTR;
use windows::Win32::Foundation::*;
use windows::Win32::UI::Input::KeyboardAndMouse::ReleaseCapture;
use windows::Win32::UI::Input::KeyboardAndMouse::SetCapture;
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::input_map::key_from_virtual_key;
use crate::input_map::mouse_position;
use crate::input_map::VK_ESCAPE;
use crate::window_class::WindowClass;

/// Per-window state the message handler feeds.
pub struct DemoWindow {
    pub input: InputState,
    pub camera: OrbitCamera,
}

impl DemoWindow {
    pub fn new(width: u32, height: u32) -> Self {
        let mut camera = OrbitCamera::default();
        camera.set_aspect(width, height);
        Self {
            input: InputState::default(),
            camera,
        }
    }

    fn mouse_down(&mut self, window: HWND, lparam: LPARAM) {
        let (x, y) = mouse_position(lparam.0);
        self.camera.on_mouse_down(x, y);
        unsafe { SetCapture(window) };
    }

    fn mouse_up(&mut self) {
        self.camera.on_mouse_up();
        if !self.input.mouse.left && !self.input.mouse.right {
            _ = unsafe { ReleaseCapture() };
        }
    }
}

impl WindowClass for DemoWindow {
    const ID: PCWSTR = w!("ManipulaWindowClass");

    fn handle(&mut self, window: HWND, message: u32, wparam: WPARAM, lparam: LPARAM) -> bool {
        match message {
            WM_KEYDOWN => {
                let virtual_key = wparam.0 as u16;
                if virtual_key == VK_ESCAPE {
                    _ = unsafe { DestroyWindow(window) };
                } else if let Some(key) = key_from_virtual_key(virtual_key) {
                    self.input.press(key);
                }
                true
            }
            WM_KEYUP => {
                if let Some(key) = key_from_virtual_key(wparam.0 as u16) {
                    self.input.release(key);
                }
                true
            }
            WM_LBUTTONDOWN => {
                self.input.mouse.left = true;
                self.mouse_down(window, lparam);
                true
            }
            WM_RBUTTONDOWN => {
                self.input.mouse.right = true;
                self.mouse_down(window, lparam);
                true
            }
            WM_LBUTTONUP => {
                self.input.mouse.left = false;
                self.mouse_up();
                true
            }
            WM_RBUTTONUP => {
                self.input.mouse.right = false;
                self.mouse_up();
                true
            }
            WM_MOUSEMOVE => {
                let (x, y) = mouse_position(lparam.0);
                self.camera.on_mouse_move(self.input.mouse, x, y);
                true
            }
            WM_KILLFOCUS => {
                debug!("focus lost, releasing held input");
                self.input = InputState::default();
                self.camera.on_mouse_up();
                true
            }
            // The main loop renders when idle; DefWindowProc validates the region.
            WM_PAINT => false,
            _ => false,
        }
    }
}
