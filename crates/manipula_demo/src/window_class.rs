use windows::core::*;
use windows::Win32::Foundation::*;
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::demo_error::DemoResult;

pub trait WindowClass {
    /// The name of the window class.
    const ID: PCWSTR;

    /// Return true when the message was consumed.
    fn handle(&mut self, window: HWND, message: u32, wparam: WPARAM, lparam: LPARAM) -> bool;
}

pub fn create_window_class_struct<W: WindowClass>(instance: HMODULE) -> DemoResult<WNDCLASSEXW> {
    // WNDCLASSEXW - https://learn.microsoft.com/en-us/windows/win32/api/winuser/ns-winuser-wndclassexw
    let wc = WNDCLASSEXW {
        cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
        style: CS_HREDRAW | CS_VREDRAW,
        lpfnWndProc: Some(wndproc::<W>),
        hInstance: instance.into(),
        hCursor: unsafe { LoadCursorW(None, IDC_ARROW)? },
        lpszClassName: W::ID,
        ..Default::default()
    };
    Ok(wc)
}

pub fn register_window_class(class: &WNDCLASSEXW) -> DemoResult<()> {
    let atom = unsafe { RegisterClassExW(class) };
    if atom == 0 {
        return Err(Error::from_win32().into());
    }
    Ok(())
}

// A panic must not unwind across the FFI boundary.
fn safe_handle<W: WindowClass>(
    behaviour: &mut W,
    window: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> bool {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        behaviour.handle(window, message, wparam, lparam)
    }))
    .unwrap_or(false)
}

extern "system" fn wndproc<W: WindowClass>(
    window: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if message == WM_CREATE {
        unsafe {
            let create_struct: &CREATESTRUCTW = &*(lparam.0 as *const CREATESTRUCTW);
            SetWindowLongPtrW(window, GWLP_USERDATA, create_struct.lpCreateParams as _);
        }
        return LRESULT(0);
    }

    let user_data = unsafe { GetWindowLongPtrW(window, GWLP_USERDATA) };
    let Some(mut behaviour) = std::ptr::NonNull::<W>::new(user_data as *mut W) else {
        // We can get messages before WM_CREATE or after WM_DESTROY.
        return unsafe { DefWindowProcW(window, message, wparam, lparam) };
    };

    let handled = match message {
        WM_DESTROY => {
            unsafe {
                SetWindowLongPtrW(window, GWLP_USERDATA, 0);
                PostQuitMessage(0);
            }
            true
        }
        _ => safe_handle(unsafe { behaviour.as_mut() }, window, message, wparam, lparam),
    };

    if handled {
        LRESULT(0)
    } else {
        unsafe { DefWindowProcW(window, message, wparam, lparam) }
    }
}
