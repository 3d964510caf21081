// Canvas - the native window the renderer draws into
//
// Geometry is only changed by OS notifications passed to `handle_event`;
// `move_to`/`resize` ask the window system and wait for it to answer.

use parking_lot::Mutex;
use raw_window_handle::{HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::monitor::MonitorHandle;
use winit::window::{Window, WindowAttributes, WindowId};

use crate::backend::GraphicsCanvas;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanvasGeometry {
    pub position: Position,
    pub size: Size,
}

impl CanvasGeometry {
    /// Apply a move or resize notification. Returns whether anything changed.
    pub fn apply(&mut self, event: &WindowEvent) -> bool {
        let before = *self;
        match event {
            WindowEvent::Moved(position) => {
                self.position = Position {
                    x: position.x,
                    y: position.y,
                };
            }
            WindowEvent::Resized(size) => {
                self.size = Size {
                    width: size.width,
                    height: size.height,
                };
            }
            _ => {}
        }
        *self != before
    }
}

/// Where to put a new window. A zero requested dimension means half the
/// monitor, centred on it.
pub fn initial_placement(monitor: Size, requested: Size) -> (Option<Position>, Size) {
    if !requested.is_zero_area() || monitor.is_zero_area() {
        return (None, requested);
    }

    let size = Size {
        width: monitor.width / 2,
        height: monitor.height / 2,
    };
    let position = Position {
        x: (monitor.width / 4) as i32,
        y: (monitor.height / 4) as i32,
    };
    (Some(position), size)
}

/// `initial_placement`, with a fixed size when there is no monitor to
/// measure either.
pub fn placement_or_fallback(monitor: Size, requested: Size) -> (Option<Position>, Size) {
    let (position, size) = initial_placement(monitor, requested);
    if size.is_zero_area() {
        (position, FALLBACK_SIZE)
    } else {
        (position, size)
    }
}

const FALLBACK_SIZE: Size = Size {
    width: 1280,
    height: 720,
};

fn monitor_size(monitor: Option<MonitorHandle>) -> Size {
    monitor
        .map(|m| Size {
            width: m.size().width,
            height: m.size().height,
        })
        .unwrap_or_default()
}

pub struct Canvas {
    window: Window,
    title: Mutex<String>,
    geometry: Mutex<CanvasGeometry>,
}

impl Canvas {
    /// Create a hidden window. Call `show` once the renderer is ready.
    pub fn new(event_loop: &ActiveEventLoop, title: &str, requested: Size) -> Result<Self, winit::error::OsError> {
        let monitor = monitor_size(
            event_loop
                .primary_monitor()
                .or_else(|| event_loop.available_monitors().next()),
        );
        let (position, size) = placement_or_fallback(monitor, requested);

        let mut attributes = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(size.width, size.height))
            .with_visible(false);
        if let Some(position) = position {
            attributes = attributes.with_position(PhysicalPosition::new(position.x, position.y));
        }

        let window = event_loop.create_window(attributes)?;

        let inner = window.inner_size();
        let outer = window.outer_position().unwrap_or_default();
        let geometry = CanvasGeometry {
            position: Position { x: outer.x, y: outer.y },
            size: Size {
                width: inner.width,
                height: inner.height,
            },
        };
        log::info!(
            "Created canvas '{}': {}x{} at ({}, {})",
            title,
            geometry.size.width,
            geometry.size.height,
            geometry.position.x,
            geometry.position.y
        );

        Ok(Self {
            window,
            title: Mutex::new(title.to_string()),
            geometry: Mutex::new(geometry),
        })
    }

    pub fn show(&self) {
        self.window.set_visible(true);
    }

    pub fn title(&self) -> String {
        self.title.lock().clone()
    }

    pub fn set_title(&self, title: &str) {
        *self.title.lock() = title.to_string();
        self.window.set_title(title);
    }

    pub fn position(&self) -> Position {
        self.geometry.lock().position
    }

    pub fn size(&self) -> Size {
        self.geometry.lock().size
    }

    pub fn move_to(&self, position: Position) {
        self.window
            .set_outer_position(PhysicalPosition::new(position.x, position.y));
    }

    pub fn resize(&self, size: Size) {
        let requested = PhysicalSize::new(size.width, size.height);
        // Some platforms apply the size right away and send no event
        if let Some(applied) = self.window.request_inner_size(requested) {
            self.handle_event(&WindowEvent::Resized(applied));
        }
    }

    /// Put the canvas back where `new` placed it, on whichever monitor it is
    /// on now. Geometry follows once the window system reports back.
    pub fn restore_placement(&self, requested: Size) {
        let monitor = monitor_size(self.window.current_monitor());
        let (position, size) = placement_or_fallback(monitor, requested);
        log::info!(
            "Restoring '{}' from {:?} {:?} to {:?} {:?}",
            self.title(),
            self.position(),
            self.size(),
            position,
            size
        );
        if let Some(position) = position {
            self.move_to(position);
        }
        self.resize(size);
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Feed a window event. Only moves and resizes change the canvas.
    pub fn handle_event(&self, event: &WindowEvent) {
        let mut geometry = self.geometry.lock();
        if geometry.apply(event) {
            log::debug!(
                "Canvas now {}x{} at ({}, {})",
                geometry.size.width,
                geometry.size.height,
                geometry.position.x,
                geometry.position.y
            );
        }
    }
}

impl GraphicsCanvas for Canvas {
    fn id(&self) -> WindowId {
        self.window.id()
    }

    fn width(&self) -> u32 {
        self.geometry.lock().size.width
    }

    fn height(&self) -> u32 {
        self.geometry.lock().size.height
    }

    fn native_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError> {
        let display = self.window.display_handle()?.as_raw();
        let window = self.window.window_handle()?.as_raw();
        Ok((display, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_event_updates_position_only() {
        let mut geometry = CanvasGeometry {
            position: Position { x: 10, y: 20 },
            size: Size { width: 800, height: 600 },
        };

        assert!(geometry.apply(&WindowEvent::Moved(PhysicalPosition::new(-5, 40))));
        assert_eq!(geometry.position, Position { x: -5, y: 40 });
        assert_eq!(geometry.size, Size { width: 800, height: 600 });
    }

    #[test]
    fn resize_event_updates_size_only() {
        let mut geometry = CanvasGeometry::default();

        assert!(geometry.apply(&WindowEvent::Resized(PhysicalSize::new(1024, 768))));
        assert_eq!(geometry.size, Size { width: 1024, height: 768 });
        assert_eq!(geometry.position, Position::default());
    }

    #[test]
    fn repeated_or_unrelated_events_change_nothing() {
        let mut geometry = CanvasGeometry::default();
        geometry.apply(&WindowEvent::Resized(PhysicalSize::new(640, 480)));

        assert!(!geometry.apply(&WindowEvent::Resized(PhysicalSize::new(640, 480))));
        assert!(!geometry.apply(&WindowEvent::CloseRequested));
        assert!(!geometry.apply(&WindowEvent::Focused(true)));
    }

    #[test]
    fn minimized_size_has_zero_area() {
        assert!(Size { width: 0, height: 0 }.is_zero_area());
        assert!(Size { width: 100, height: 0 }.is_zero_area());
        assert!(!Size { width: 1, height: 1 }.is_zero_area());
    }

    #[test]
    fn zero_request_takes_half_monitor_centred() {
        let monitor = Size { width: 1920, height: 1080 };
        let (position, size) = initial_placement(monitor, Size::default());

        assert_eq!(size, Size { width: 960, height: 540 });
        assert_eq!(position, Some(Position { x: 480, y: 270 }));
    }

    #[test]
    fn explicit_request_is_kept() {
        let monitor = Size { width: 1920, height: 1080 };
        let requested = Size { width: 800, height: 600 };
        assert_eq!(initial_placement(monitor, requested), (None, requested));
    }

    #[test]
    fn no_monitor_falls_back_to_fixed_size() {
        let (position, size) = placement_or_fallback(Size::default(), Size::default());
        assert_eq!(position, None);
        assert_eq!(size, Size { width: 1280, height: 720 });

        let requested = Size { width: 640, height: 480 };
        assert_eq!(placement_or_fallback(Size::default(), requested), (None, requested));

        let monitor = Size { width: 2560, height: 1440 };
        let (position, size) = placement_or_fallback(monitor, Size::default());
        assert_eq!(position, Some(Position { x: 640, y: 360 }));
        assert_eq!(size, Size { width: 1280, height: 720 });
    }
}
