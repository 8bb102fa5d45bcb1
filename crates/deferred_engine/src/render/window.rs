//! Window management using GLFW
//!
//! Provides the OpenGL 3.3 core window, frame timing and event translation.

use glfw::Context;
use thiserror::Error;

use crate::input::{InputEvent, KeyCode};
use crate::render::api::Extent2D;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window or its GL context could not be created
    #[error("Window creation failed ({width}x{height})")]
    CreationFailed {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// GL entry points could not be resolved or the context is too old
    #[error("OpenGL loader failed: {0}")]
    GraphicsLoaderFailed(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper with a current OpenGL context
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a window with an OpenGL 3.3 core context and make it current
    ///
    /// The cursor is captured for mouse look.
    pub fn new(title: &str, extent: Extent2D) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        glfw.window_hint(glfw::WindowHint::ContextVersion(3, 3));
        glfw.window_hint(glfw::WindowHint::OpenGlProfile(glfw::OpenGlProfileHint::Core));
        glfw.window_hint(glfw::WindowHint::OpenGlForwardCompat(cfg!(target_os = "macos")));
        glfw.window_hint(glfw::WindowHint::DepthBits(Some(24)));

        let (mut window, events) = glfw
            .create_window(extent.width, extent.height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed {
                width: extent.width,
                height: extent.height,
            })?;

        window.make_current();
        window.set_key_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_scroll_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_close_polling(true);
        window.set_cursor_mode(glfw::CursorMode::Disabled);

        log::info!("Created {}x{} window '{}'", extent.width, extent.height, title);

        Ok(Self { glfw, window, events })
    }

    /// Whether the window was asked to close
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request or cancel closing
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Seconds since GLFW was initialized
    pub fn time(&self) -> f64 {
        self.glfw.get_time()
    }

    /// Size of the drawable surface in pixels
    pub fn framebuffer_extent(&self) -> Extent2D {
        let (width, height) = self.window.get_framebuffer_size();
        Extent2D::new(width.max(0) as u32, height.max(0) as u32)
    }

    /// Present the back buffer
    pub fn swap_buffers(&mut self) {
        self.window.swap_buffers();
    }

    /// Address of a GL entry point in the current context
    pub fn proc_address(&mut self, name: &str) -> *const std::ffi::c_void {
        self.window.get_proc_address(name) as *const _
    }

    /// Poll GLFW and translate pending events
    pub fn poll_events(&mut self) -> Vec<InputEvent> {
        self.glfw.poll_events();
        glfw::flush_messages(&self.events)
            .filter_map(|(_, event)| translate_event(event))
            .collect()
    }
}

fn translate_event(event: glfw::WindowEvent) -> Option<InputEvent> {
    match event {
        glfw::WindowEvent::Key(key, _, action, _) => map_key(key).map(|key| InputEvent::Key {
            key,
            pressed: action != glfw::Action::Release,
        }),
        glfw::WindowEvent::CursorPos(x, y) => Some(InputEvent::CursorMoved { x, y }),
        glfw::WindowEvent::Scroll(_, y_offset) => Some(InputEvent::Scrolled { y_offset }),
        glfw::WindowEvent::FramebufferSize(width, height) if width > 0 && height > 0 => Some(
            InputEvent::FramebufferResized(Extent2D::new(width as u32, height as u32)),
        ),
        glfw::WindowEvent::Close => Some(InputEvent::CloseRequested),
        _ => None,
    }
}

const fn map_key(key: glfw::Key) -> Option<KeyCode> {
    match key {
        glfw::Key::W => Some(KeyCode::W),
        glfw::Key::A => Some(KeyCode::A),
        glfw::Key::S => Some(KeyCode::S),
        glfw::Key::D => Some(KeyCode::D),
        glfw::Key::Q => Some(KeyCode::Q),
        glfw::Key::E => Some(KeyCode::E),
        glfw::Key::Num1 => Some(KeyCode::Num1),
        glfw::Key::Num2 => Some(KeyCode::Num2),
        glfw::Key::Escape => Some(KeyCode::Escape),
        _ => None,
    }
}
