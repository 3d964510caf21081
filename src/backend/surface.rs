// Surface - the seam between the backend and the native window
//
// Backend code only sees `GraphicsCanvas`. Everything window-system
// specific lives in the two functions below.

use ash::vk;
use raw_window_handle::{HandleError, RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;

use super::{BackendError, BackendResult};

/// What the renderer needs from a window.
pub trait GraphicsCanvas {
    fn id(&self) -> winit::window::WindowId;
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Raw handles used to create the presentation surface.
    fn native_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError>;

    fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width(),
            height: self.height(),
        }
    }
}

/// Instance extensions needed to present to a window of this display kind.
pub fn required_instance_extensions(display: RawDisplayHandle) -> BackendResult<Vec<&'static CStr>> {
    use ash::extensions::khr;

    let platform = match display {
        RawDisplayHandle::Windows(_) => khr::Win32Surface::name(),
        RawDisplayHandle::Xlib(_) => khr::XlibSurface::name(),
        RawDisplayHandle::Xcb(_) => khr::XcbSurface::name(),
        RawDisplayHandle::Wayland(_) => khr::WaylandSurface::name(),
        other => {
            return Err(BackendError::UnsupportedPlatform(format!("{:?}", other)));
        }
    };

    Ok(vec![khr::Surface::name(), platform])
}

/// Create a presentation surface for the given window.
///
/// # Safety
/// The handles must belong to a live window that outlives the returned surface.
pub unsafe fn create_surface(
    entry: &ash::Entry,
    instance: &ash::Instance,
    display: RawDisplayHandle,
    window: RawWindowHandle,
) -> BackendResult<vk::SurfaceKHR> {
    use ash::extensions::khr;

    let surface = match (display, window) {
        (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(handle)) => {
            let hinstance = handle.hinstance.map(|h| h.get()).unwrap_or(0) as *const std::ffi::c_void;
            let hwnd = handle.hwnd.get() as *const std::ffi::c_void;
            let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                .hinstance(hinstance)
                .hwnd(hwnd);
            khr::Win32Surface::new(entry, instance).create_win32_surface(&create_info, None)?
        }
        (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(window)) => {
            let dpy = display
                .display
                .map(|d| d.as_ptr())
                .unwrap_or(std::ptr::null_mut());
            let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                .dpy(dpy as *mut vk::Display)
                .window(window.window);
            khr::XlibSurface::new(entry, instance).create_xlib_surface(&create_info, None)?
        }
        (RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(window)) => {
            let connection = display
                .connection
                .map(|c| c.as_ptr())
                .unwrap_or(std::ptr::null_mut());
            let create_info = vk::XcbSurfaceCreateInfoKHR::builder()
                .connection(connection as *mut vk::xcb_connection_t)
                .window(window.window.get());
            khr::XcbSurface::new(entry, instance).create_xcb_surface(&create_info, None)?
        }
        (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(window)) => {
            let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                .display(display.display.as_ptr() as *mut vk::wl_display)
                .surface(window.surface.as_ptr() as *mut vk::wl_surface);
            khr::WaylandSurface::new(entry, instance).create_wayland_surface(&create_info, None)?
        }
        (display, window) => {
            return Err(BackendError::UnsupportedPlatform(format!(
                "{:?} / {:?}",
                display, window
            )));
        }
    };

    Ok(surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{WaylandDisplayHandle, XlibDisplayHandle};
    use std::ptr::NonNull;

    #[test]
    fn xlib_needs_surface_and_xlib_extensions() {
        let display = RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0));
        let extensions = required_instance_extensions(display).unwrap();
        assert_eq!(
            extensions,
            vec![
                ash::extensions::khr::Surface::name(),
                ash::extensions::khr::XlibSurface::name()
            ]
        );
    }

    #[test]
    fn wayland_needs_wayland_extension() {
        let mut dummy = 0u8;
        let ptr = NonNull::from(&mut dummy).cast();
        let display = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(ptr));
        let extensions = required_instance_extensions(display).unwrap();
        assert!(extensions.contains(&ash::extensions::khr::WaylandSurface::name()));
    }

    #[test]
    fn unknown_display_is_unsupported() {
        let display = RawDisplayHandle::Web(raw_window_handle::WebDisplayHandle::new());
        assert!(matches!(
            required_instance_extensions(display),
            Err(BackendError::UnsupportedPlatform(_))
        ));
    }
}
