//! Point light used for shading and as the shadow map's viewpoint.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3};

use crate::math;

#[derive(Clone, Debug, PartialEq)]
pub struct LightSource {
    pub position: Point3<f32>,
    /// Point the light looks at when rendering the shadow map.
    pub target: Point3<f32>,
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
}

impl LightSource {
    pub fn new(position: Point3<f32>) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Moves the light along the ray from the origin.
    pub fn scale_position(&mut self, factor: f32) {
        self.position = Point3::from_vec(self.position.to_vec() * factor);
    }

    pub fn translate(&mut self, offset: Vector3<f32>) {
        self.position += offset;
    }

    /// View matrix from the light towards its target.
    ///
    /// The up vector falls back to +Z when the light sits straight above or
    /// below the target. A light sitting on its target looks straight down.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let mut target = self.target;
        let mut forward = target - self.position;
        if forward.magnitude2() < 1e-12 {
            log::warn!("light at {:?} coincides with its target; looking down", self.position);
            forward = -Vector3::unit_y();
            target = self.position + forward;
        }
        let up = if forward.normalize().cross(Vector3::unit_y()).magnitude2() < 1e-6 {
            Vector3::unit_z()
        } else {
            Vector3::unit_y()
        };
        math::look_at(self.position, target, up)
    }
}

impl Default for LightSource {
    fn default() -> Self {
        Self {
            position: Point3::new(2.0, 2.0, 0.0),
            target: Point3::origin(),
            ambient: Vector3::new(0.2, 0.2, 0.2),
            diffuse: Vector3::new(0.9, 0.9, 0.9),
            specular: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{SquareMatrix, Vector4};

    #[test]
    fn light_straight_above_has_invertible_view() {
        let light = LightSource::new(Point3::new(0.0, 7.1, 0.0));
        let view = light.view_matrix();
        assert!(view.invert().is_some());
        let target = view * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(target, Vector4::new(0.0, 0.0, -7.1, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn light_on_its_target_still_has_a_finite_view() {
        let mut light = LightSource::new(Point3::new(1.0, 2.0, 3.0));
        light.target = light.position;
        let view = light.view_matrix();
        let columns: [[f32; 4]; 4] = view.into();
        assert!(columns.iter().flatten().all(|v| v.is_finite()));
        assert!(view.invert().is_some());
        let below = view * Vector4::new(1.0, 1.0, 3.0, 1.0);
        assert_relative_eq!(below, Vector4::new(0.0, 0.0, -1.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn scaling_moves_along_ray() {
        let mut light = LightSource::new(Point3::new(1.0, 2.0, 0.0));
        light.scale_position(1.1);
        assert_relative_eq!(light.position, Point3::new(1.1, 2.2, 0.0), epsilon = 1e-6);
    }
}
