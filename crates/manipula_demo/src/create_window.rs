use widestring::U16CStr;
use windows::core::*;
use windows::Win32::Foundation::*;
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::demo_error::DemoResult;
use crate::window_class::WindowClass;

/// `window_data` becomes the window's user data and must outlive the window.
pub fn create_window<W: WindowClass>(
    our_module: HMODULE,
    window_rect: RECT,
    title: &U16CStr,
    window_data: *mut W,
) -> DemoResult<HWND> {
    let hwnd = unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            W::ID,
            PCWSTR(title.as_ptr()),
            WS_OVERLAPPEDWINDOW,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            window_rect.right - window_rect.left,
            window_rect.bottom - window_rect.top,
            None,                    // no parent window
            None,                    // no menus
            Some(our_module.into()),
            Some(window_data as _),
        )
    }?;
    Ok(hwnd)
}
