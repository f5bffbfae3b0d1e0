//! Win32 message payloads to camera input.

use frame_pipeline::camera::Key;

pub const VK_ESCAPE: u16 = 0x1B;

pub fn key_from_virtual_key(virtual_key: u16) -> Option<Key> {
    match virtual_key {
        0x57 => Some(Key::W),
        0x41 => Some(Key::A),
        0x53 => Some(Key::S),
        0x44 => Some(Key::D),
        0x25 => Some(Key::Left),
        0x26 => Some(Key::Up),
        0x27 => Some(Key::Right),
        0x28 => Some(Key::Down),
        _ => None,
    }
}

/// Client coordinates packed into a mouse message's LPARAM. Both halves are
/// signed so positions left of or above the client area stay negative.
pub fn mouse_position(lparam: isize) -> (i32, i32) {
    let x = (lparam & 0xFFFF) as u16 as i16 as i32;
    let y = ((lparam >> 16) & 0xFFFF) as u16 as i16 as i32;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_and_sun_keys_map() {
        assert_eq!(key_from_virtual_key(b'W' as u16), Some(Key::W));
        assert_eq!(key_from_virtual_key(b'D' as u16), Some(Key::D));
        assert_eq!(key_from_virtual_key(0x26), Some(Key::Up));
        assert_eq!(key_from_virtual_key(VK_ESCAPE), None);
    }

    #[test]
    fn negative_coordinates_survive() {
        assert_eq!(mouse_position((20 << 16) | 640), (640, 20));
        assert_eq!(mouse_position(0xFFFF_FFFE), (-2, -1));
    }
}
