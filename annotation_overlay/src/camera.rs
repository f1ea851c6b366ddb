//! Perspective camera used both to project anchors and to build the pick ray
//! that runs back through a projected point.

use glam::{DMat3, DMat4, DVec2, DVec3, DVec4};
use serde::Deserialize;

use crate::geometry::Ray;

/// Depth (in glam's 0..1 clip range) used when unprojecting a device point to
/// aim the pick ray. Any value strictly inside the frustum gives the same
/// direction.
const UNPROJECT_DEPTH: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Camera {
    pub eye: DVec3,
    pub target: DVec3,
    #[serde(default = "default_up")]
    pub up: DVec3,
    #[serde(default)]
    pub roll_degrees: f64,
    pub fov_degrees: f64,
    pub near: f64,
    pub far: f64,
    #[serde(default = "default_aspect")]
    pub aspect: f64,
}

fn default_up() -> DVec3 {
    DVec3::Y
}

fn default_aspect() -> f64 {
    1.0
}

impl Camera {
    pub fn perspective(eye: DVec3, target: DVec3, fov_degrees: f64, aspect: f64) -> Self {
        Self {
            eye,
            target,
            up: DVec3::Y,
            roll_degrees: 0.0,
            fov_degrees,
            near: 0.1,
            far: 1000.0,
            aspect,
        }
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
    }

    /// Unit view direction, or `None` when eye and target coincide.
    pub fn forward(&self) -> Option<DVec3> {
        let forward = self.target - self.eye;
        if !forward.is_finite() || forward.length_squared() <= f64::EPSILON {
            return None;
        }
        Some(forward.normalize())
    }

    fn resolved_up(&self, forward: DVec3) -> DVec3 {
        let mut up = self.up;
        let roll_radians = self.roll_degrees.to_radians();
        if roll_radians.abs() > f64::EPSILON {
            up = DMat3::from_axis_angle(forward, roll_radians) * up;
        }
        if up.cross(forward).length_squared() <= f64::EPSILON {
            up = if forward.y.abs() < 0.99 { DVec3::Y } else { DVec3::Z };
        }
        up.normalize()
    }

    pub fn view(&self) -> Option<DMat4> {
        let forward = self.forward()?;
        let up = self.resolved_up(forward);
        Some(DMat4::look_at_rh(self.eye, self.target, up))
    }

    pub fn view_projection(&self) -> Option<DMat4> {
        if !self.aspect.is_finite() || self.aspect <= 0.0 {
            return None;
        }
        if !self.fov_degrees.is_finite() || self.fov_degrees <= 0.0 {
            return None;
        }
        let near = self.near.max(1e-4);
        if !self.far.is_finite() || self.far <= near {
            return None;
        }
        let view = self.view()?;
        let projection =
            DMat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, near, self.far);
        Some(projection * view)
    }

    /// Perspective-divided device coordinates of `position`. Points on or
    /// behind the eye plane have no meaningful projection.
    pub fn project(&self, position: DVec3) -> Option<DVec3> {
        let clip = self.view_projection()? * position.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        if !ndc.is_finite() {
            return None;
        }
        Some(ndc)
    }

    pub fn unproject(&self, device: DVec2, depth: f64) -> Option<DVec3> {
        let inverse = self.view_projection()?.inverse();
        let world: DVec4 = inverse * DVec4::new(device.x, device.y, depth, 1.0);
        if world.w.abs() <= f64::EPSILON {
            return None;
        }
        let point = world.truncate() / world.w;
        point.is_finite().then_some(point)
    }

    /// Ray from the eye through the given device point.
    pub fn ray_through(&self, device: DVec2) -> Option<Ray> {
        let through = self.unproject(device, UNPROJECT_DEPTH)?;
        let direction = through - self.eye;
        if direction.length_squared() <= f64::EPSILON {
            return None;
        }
        Some(Ray::new(self.eye, direction.normalize()))
    }

    /// Camera right and up axes in world space, used to orient sprites.
    pub fn billboard_axes(&self) -> Option<(DVec3, DVec3)> {
        let view = self.view()?;
        let camera_to_world = view.inverse();
        let right = camera_to_world.transform_vector3(DVec3::X);
        let up = camera_to_world.transform_vector3(DVec3::Y);
        Some((right.normalize(), up.normalize()))
    }
}

#[cfg(test)]
mod camera_tests {
    use super::*;

    fn camera() -> Camera {
        Camera::perspective(DVec3::new(0.0, 0.0, 10.0), DVec3::ZERO, 60.0, 4.0 / 3.0)
    }

    #[test]
    fn target_projects_to_device_origin() {
        let ndc = camera().project(DVec3::ZERO).expect("projection");
        assert!(ndc.x.abs() < 1e-12);
        assert!(ndc.y.abs() < 1e-12);
    }

    #[test]
    fn points_behind_the_eye_do_not_project() {
        assert!(camera().project(DVec3::new(0.0, 0.0, 20.0)).is_none());
    }

    #[test]
    fn coincident_eye_and_target_is_degenerate() {
        let camera = Camera::perspective(DVec3::ONE, DVec3::ONE, 60.0, 1.0);
        assert!(camera.view_projection().is_none());
        assert!(camera.ray_through(DVec2::ZERO).is_none());
    }

    #[test]
    fn zero_aspect_is_degenerate() {
        let mut camera = camera();
        camera.set_aspect(0.0);
        assert!(camera.project(DVec3::ZERO).is_none());
    }

    #[test]
    fn far_plane_not_beyond_near_is_degenerate() {
        let mut camera = camera();
        camera.near = 5.0;
        camera.far = 5.0;
        assert!(camera.project(DVec3::ZERO).is_none());
        camera.far = 5.5;
        assert!(camera.view_projection().is_some());
        camera.far = f64::INFINITY;
        assert!(camera.view_projection().is_none());
    }

    #[test]
    fn ray_through_projection_passes_through_point() {
        let camera = camera();
        let point = DVec3::new(1.5, -0.75, 2.0);
        let ndc = camera.project(point).expect("projection");
        let ray = camera.ray_through(ndc.truncate()).expect("ray");
        let to_point = (point - ray.origin).normalize();
        assert!(to_point.dot(ray.direction) > 1.0 - 1e-9);
    }

    #[test]
    fn looking_straight_down_picks_a_usable_up_axis() {
        let camera = Camera::perspective(DVec3::new(0.0, 10.0, 0.0), DVec3::ZERO, 45.0, 1.0);
        assert!(camera.project(DVec3::ZERO).is_some());
    }
}
