use std::sync::Arc;
use winit::dpi::LogicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

pub struct PlatformConfig {
    pub title: String,
    /// Logical size; menus and the editor grid are laid out in these units.
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Crag".to_string(),
            width: 800,
            height: 450,
            resizable: true,
        }
    }
}

pub fn create_window(event_loop: &ActiveEventLoop, config: &PlatformConfig) -> Arc<Window> {
    let attrs = WindowAttributes::default()
        .with_title(&config.title)
        .with_resizable(config.resizable)
        .with_min_inner_size(LogicalSize::new(config.width / 2, config.height / 2))
        .with_inner_size(LogicalSize::new(config.width, config.height));

    log::debug!(
        "Creating window '{}' at {}x{}",
        config.title,
        config.width,
        config.height
    );
    let window = event_loop
        .create_window(attrs)
        .expect("Failed to create window");
    Arc::new(window)
}
