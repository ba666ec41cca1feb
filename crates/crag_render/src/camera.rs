use glam::{Mat4, Vec2};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

/// Orthographic camera over a y-down world: `position` is the world point at
/// the centre of the view, and larger y values are further down the screen.
pub struct Camera2D {
    pub position: Vec2,
    pub zoom: f32,
    /// Visible area in logical pixels.
    pub viewport: Vec2,
}

impl Camera2D {
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
            viewport: Vec2::new(viewport_width, viewport_height),
        }
    }

    /// Camera whose world units are logical screen pixels with (0, 0) at the
    /// top-left corner. Menus and HUD buttons are drawn with this.
    pub fn screen(viewport_width: f32, viewport_height: f32) -> Self {
        let mut camera = Self::new(viewport_width, viewport_height);
        camera.position = camera.viewport * 0.5;
        camera
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Vec2::new(width, height);
    }

    /// World point under a logical screen position.
    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        self.position + (screen - self.viewport * 0.5) / self.zoom
    }

    pub fn build_uniform(&self) -> CameraUniform {
        let half = self.viewport / (2.0 * self.zoom);

        // bottom/top swapped relative to a y-up camera.
        let proj = Mat4::orthographic_rh(
            self.position.x - half.x,
            self.position.x + half.x,
            self.position.y + half.y,
            self.position.y - half.y,
            -1.0,
            1.0,
        );

        CameraUniform {
            view_proj: proj.to_cols_array_2d(),
        }
    }
}
