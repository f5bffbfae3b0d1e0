use eyre::eyre;
use frame_pipeline::d3d12::D3D12Backend;
use frame_pipeline::d3d12::D3D12Config;
use frame_pipeline::scene::demo_scene;
use frame_pipeline::FrameRenderer;
use frame_pipeline::GameTimer;
use tracing::error;
use tracing::info;
use widestring::U16CString;
use windows::Win32::Foundation::*;
use windows::Win32::System::LibraryLoader::*;
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::config::DemoConfig;
use crate::create_window::create_window;
use crate::demo_error::DemoResult;
use crate::demo_window::DemoWindow;
use crate::window_class::create_window_class_struct;
use crate::window_class::register_window_class;

pub fn run_windowed(config: &DemoConfig) -> DemoResult<()> {
    let our_module = get_handle_to_file_used_to_create_the_calling_process()?;

    let window_class = create_window_class_struct::<DemoWindow>(our_module)?;
    register_window_class(&window_class)?;

    let mut window_rect = RECT {
        left: 0,
        top: 0,
        right: config.width as i32,
        bottom: config.height as i32,
    };
    // Grow the outer rectangle so the client area matches the back buffer.
    unsafe { AdjustWindowRect(&mut window_rect, WS_OVERLAPPEDWINDOW, false)? };

    let title = U16CString::from_str(config.title()).map_err(|e| eyre!("window title: {e}"))?;

    // Lives until the function returns, after the window is destroyed.
    let mut window = Box::new(DemoWindow::new(config.width, config.height));
    let window_ptr: *mut DemoWindow = &mut *window;
    let hwnd = create_window::<DemoWindow>(our_module, window_rect, &title, window_ptr)?;

    let backend = D3D12Backend::new(
        hwnd,
        D3D12Config {
            width: config.width,
            height: config.height,
            use_warp_device: config.use_warp_device,
            vsync: config.vsync,
        },
    )?;
    let scene = demo_scene(config.mesh.as_deref(), config.textures.as_deref())?;
    let mut renderer = FrameRenderer::new(backend, scene)?;

    unsafe { _ = ShowWindow(hwnd, SW_SHOW) };
    info!(frames = ?config.frame_limit(), "entering message loop");

    let mut timer = GameTimer::new();
    let mut done = false;
    while !done {
        let mut message = MSG::default();

        if unsafe { PeekMessageW(&mut message, None, 0, 0, PM_REMOVE) }.into() {
            unsafe {
                _ = TranslateMessage(&message);
                DispatchMessageW(&message);
            }

            if message.message == WM_QUIT {
                done = true;
            }
        } else {
            // Render when idle.
            timer.tick();
            let window = unsafe { &mut *window_ptr };
            window.camera.update(&window.input, timer.delta_time());

            if let Err(e) = renderer.tick(&window.camera, &timer) {
                error!(device_lost = e.is_device_lost(), "frame failed: {e}");
                unsafe { _ = DestroyWindow(hwnd) };
                return Err(e.into());
            }

            if config
                .frame_limit()
                .is_some_and(|limit| renderer.frame_count() >= limit)
            {
                unsafe { DestroyWindow(hwnd)? };
                done = true;
            }
        }
    }

    let last = renderer.flush()?;
    info!(frames = renderer.frame_count(), fence_value = last, "window closed");
    drop(renderer);
    drop(window);
    Ok(())
}

fn get_handle_to_file_used_to_create_the_calling_process() -> DemoResult<HMODULE> {
    let mut out = Default::default();
    unsafe { GetModuleHandleExW(Default::default(), None, &mut out)? };
    Ok(out)
}
