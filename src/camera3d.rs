use crate::config::CameraConfig;
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use winit::dpi::PhysicalSize;

const DEFAULT_UP: Vec3 = Vec3::Y;

/// Perspective camera looking at the globe.
#[derive(Debug, Clone)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera3D {
    pub fn new(position: Vec3, target: Vec3, fov_y_radians: f32, near: f32, far: f32) -> Self {
        Self { position, target, up: DEFAULT_UP, fov_y_radians, near, far }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect.max(0.0001), self.near, self.far)
    }

    pub fn view_projection(&self, viewport: PhysicalSize<u32>) -> Mat4 {
        let aspect = if viewport.height > 0 { viewport.width as f32 / viewport.height as f32 } else { 1.0 };
        self.projection_matrix(aspect) * self.view_matrix()
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// World-space ray through a pointer position in normalized device
    /// coordinates ([-1,1] on both axes, y up).
    pub fn ndc_ray(&self, ndc: Vec2, viewport: PhysicalSize<u32>) -> Option<(Vec3, Vec3)> {
        if viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let clip = Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
        let inv_view_proj = self.view_projection(viewport).inverse();
        let world = inv_view_proj * clip;
        if world.w.abs() < f32::EPSILON {
            return None;
        }
        let through = (world.truncate() / world.w) - self.position;
        if through.length_squared() <= f32::EPSILON {
            return None;
        }
        Some((self.position, through.normalize()))
    }

    pub fn project_point(&self, point: Vec3, viewport: PhysicalSize<u32>) -> Option<Vec2> {
        if viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let clip = self.view_projection(viewport) * point.extend(1.0);
        if clip.w.abs() < f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let x = (ndc.x + 1.0) * 0.5 * viewport.width as f32;
        let y = (1.0 - ndc.y) * 0.5 * viewport.height as f32;
        Some(Vec2::new(x, y))
    }
}

/// Damped orbit controller around a fixed target. Drag input accumulates
/// into a pending spherical delta that bleeds off over subsequent frames.
/// While the gizmo is dragging the controller is disabled and drag input is
/// discarded.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub radius: f32,
    pub yaw_radians: f32,
    pub pitch_radians: f32,
    pub enabled: bool,
    zoom_enabled: bool,
    damping: f32,
    min_pitch: f32,
    pending: Vec2,
}

impl OrbitCamera {
    pub fn from_config(config: &CameraConfig) -> Self {
        let position = Vec3::from_array(config.position);
        let target = Vec3::from_array(config.target);
        let offset = position - target;
        let radius = offset.length().max(0.01);
        let yaw = offset.x.atan2(offset.z);
        let pitch = (offset.y / radius).clamp(-1.0, 1.0).asin();
        Self {
            target,
            radius,
            yaw_radians: yaw,
            pitch_radians: pitch,
            enabled: true,
            zoom_enabled: config.zoom_enabled,
            damping: config.damping.clamp(0.0, 1.0),
            min_pitch: std::f32::consts::FRAC_PI_2 - config.max_polar,
            pending: Vec2::ZERO,
        }
    }

    pub fn to_camera(&self, fov_y_radians: f32, near: f32, far: f32) -> Camera3D {
        let rotation = Quat::from_euler(glam::EulerRot::YXZ, self.yaw_radians, -self.pitch_radians, 0.0);
        let offset = rotation * Vec3::new(0.0, 0.0, self.radius);
        Camera3D::new(self.target + offset, self.target, fov_y_radians, near, far)
    }

    /// Feed a pointer-drag delta (radians). Ignored while disabled, so a
    /// gizmo drag never doubles as an orbit.
    pub fn orbit(&mut self, delta: Vec2) {
        if !self.enabled {
            return;
        }
        self.pending += delta;
    }

    pub fn zoom(&mut self, factor: f32) {
        if !self.enabled || !self.zoom_enabled {
            return;
        }
        self.radius = (self.radius * factor).clamp(0.5, 100.0);
    }

    /// Per-frame damping step: apply a slice of the pending delta, decay the
    /// rest. Runs every tick even without fresh input.
    pub fn update(&mut self) {
        self.yaw_radians += self.pending.x;
        self.pitch_radians = (self.pitch_radians + self.pending.y)
            .clamp(self.min_pitch, std::f32::consts::FRAC_PI_2 - 0.01);
        self.pending *= 1.0 - self.damping;
        if self.pending.length_squared() < 1e-10 {
            self.pending = Vec2::ZERO;
        }
    }

    pub fn is_settled(&self) -> bool {
        self.pending == Vec2::ZERO
    }
}
