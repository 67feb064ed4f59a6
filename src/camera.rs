//! Orbit camera, projection and the input-driven camera controller.
//!
//! The camera looks at `center` from `distance` away, turned by `azimuth`
//! (about Y) and `zenith` (about X). Its view matrix is
//!
//! ```text
//! V = T(0, 0, -distance) * Rx(zenith) * Ry(azimuth) * T(-center)
//! ```
//!
//! i.e. the look-at point is moved to the origin first, then the world is
//! rotated, then pushed back along -Z. See [`crate::math`] for the
//! multiplication convention.

use cgmath::{EuclideanSpace, Matrix4, Point3, SquareMatrix, Vector3, Vector4};

use crate::math;

/// Orbit camera with an eagerly derived view matrix.
///
/// Parameters are private so the view matrix can never go stale: every
/// mutator recomputes it before returning.
#[derive(Clone, Debug)]
pub struct Camera {
    azimuth: f32,
    zenith: f32,
    distance: f32,
    center: Point3<f32>,
    view: Matrix4<f32>,
}

/// A partial update of the orbit parameters. Unset fields keep their value.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrbitUpdate {
    pub azimuth: Option<f32>,
    pub zenith: Option<f32>,
    pub distance: Option<f32>,
    pub center: Option<Point3<f32>>,
}

impl Camera {
    /// Smallest distance the camera may sit from its center.
    pub const MIN_DISTANCE: f32 = 0.01;

    pub fn new(azimuth: f32, zenith: f32, distance: f32, center: Point3<f32>) -> Self {
        let mut camera = Self {
            azimuth,
            zenith,
            distance: distance.max(Self::MIN_DISTANCE),
            center,
            view: Matrix4::identity(),
        };
        camera.update();
        camera
    }

    pub fn set_orbit(&mut self, update: OrbitUpdate) {
        if let Some(azimuth) = update.azimuth {
            self.azimuth = azimuth;
        }
        if let Some(zenith) = update.zenith {
            self.zenith = zenith;
        }
        if let Some(distance) = update.distance {
            if distance < Self::MIN_DISTANCE {
                log::debug!("camera distance {distance} clamped to {}", Self::MIN_DISTANCE);
            }
            self.distance = distance.max(Self::MIN_DISTANCE);
        }
        if let Some(center) = update.center {
            self.center = center;
        }
        self.update();
    }

    pub fn rotate(&mut self, d_azimuth: f32, d_zenith: f32) {
        self.set_orbit(OrbitUpdate {
            azimuth: Some(self.azimuth + d_azimuth),
            zenith: Some(self.zenith + d_zenith),
            ..Default::default()
        });
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        let center = Point3::new(self.center.x + dx, self.center.y + dy, self.center.z);
        self.set_orbit(OrbitUpdate {
            center: Some(center),
            ..Default::default()
        });
    }

    /// Moves towards (`delta < 0`) or away from the center, never closer
    /// than `floor`.
    pub fn zoom(&mut self, delta: f32, floor: f32) {
        let distance = (self.distance + delta).max(floor);
        self.set_orbit(OrbitUpdate {
            distance: Some(distance),
            ..Default::default()
        });
    }

    /// Recomputes the view matrix from the orbit parameters.
    pub fn update(&mut self) {
        let to_origin = math::translation(-self.center.to_vec());
        let rotation = math::rotation_x(self.zenith) * math::rotation_y(self.azimuth);
        let pull_back = math::translation(Vector3::new(0.0, 0.0, -self.distance));
        self.view = pull_back * rotation * to_origin;
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.view
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn zenith(&self) -> f32 {
        self.zenith
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn center(&self) -> Point3<f32> {
        self.center
    }

    /// World-space position of the eye.
    pub fn eye(&self) -> Point3<f32> {
        let inverse = self.inverse_rotation();
        let offset = inverse * Vector4::new(0.0, 0.0, self.distance, 0.0);
        self.center + offset.truncate()
    }

    /// World-space up direction of the camera.
    pub fn up(&self) -> Vector3<f32> {
        (self.inverse_rotation() * Vector4::unit_y()).truncate()
    }

    fn inverse_rotation(&self) -> Matrix4<f32> {
        math::rotation_y(-self.azimuth) * math::rotation_x(-self.zenith)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(0.0, 0.0, 5.0, Point3::origin())
    }
}

/// Perspective projection built from a symmetric frustum.
#[derive(Clone, Debug)]
pub struct Projection {
    aspect: f32,
    fovy: f32,
    znear: f32,
    zfar: f32,
}

impl Projection {
    /// `fovy` is the vertical field of view in radians.
    pub fn new(width: u32, height: u32, fovy: f32, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy,
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// The frustum in OpenGL clip space.
    pub fn gl_matrix(&self) -> Matrix4<f32> {
        math::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }

    /// The matrix handed to shaders (wgpu depth range).
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        math::OPENGL_TO_WGPU_MATRIX * self.gl_matrix()
    }
}

/// Maps mouse input onto camera motion.
///
/// Deltas are normalised by the window size so dragging across the whole
/// window moves by `sensitivity` units (or radians).
#[derive(Clone, Debug)]
pub struct CameraController {
    pub zoom_step: f32,
    pub zoom_floor: f32,
    pub sensitivity: f32,
}

impl CameraController {
    pub fn new(zoom_step: f32, zoom_floor: f32, sensitivity: f32) -> Self {
        Self {
            zoom_step,
            zoom_floor,
            sensitivity,
        }
    }

    /// One wheel notch: positive `notches` zoom in.
    pub fn handle_wheel(&self, camera: &mut Camera, notches: f32) {
        camera.zoom(-notches * self.zoom_step, self.zoom_floor);
    }

    /// Left-drag: move the look-at point.
    pub fn handle_pan(&self, camera: &mut Camera, delta: (f64, f64), window: (u32, u32)) {
        let (dx, dy) = normalise(delta, window);
        camera.pan(-dx * self.sensitivity, -dy * self.sensitivity);
    }

    /// Right-drag: orbit around the look-at point.
    pub fn handle_orbit(&self, camera: &mut Camera, delta: (f64, f64), window: (u32, u32)) {
        let (dx, dy) = normalise(delta, window);
        camera.rotate(-dx * self.sensitivity, -dy * self.sensitivity);
    }
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

fn normalise(delta: (f64, f64), window: (u32, u32)) -> (f32, f32) {
    let width = f64::from(window.0.max(1));
    let height = f64::from(window.1.max(1));
    ((delta.0 / width) as f32, (delta.1 / height) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_camera_is_pulled_back_five_units() {
        let camera = Camera::new(0.0, 0.0, 5.0, Point3::origin());
        assert_relative_eq!(
            camera.view_matrix(),
            Matrix4::from_translation(Vector3::new(0.0, 0.0, -5.0)),
            epsilon = 1e-6
        );
    }

    #[test]
    fn view_is_recomputed_on_every_change() {
        let mut camera = Camera::default();
        let before = camera.view_matrix();
        camera.rotate(0.5, 0.0);
        assert_ne!(before, camera.view_matrix());
        camera.rotate(-0.5, 0.0);
        assert_relative_eq!(before, camera.view_matrix(), epsilon = 1e-6);
    }

    #[test]
    fn non_positive_distance_is_clamped() {
        let mut camera = Camera::default();
        camera.set_orbit(OrbitUpdate {
            distance: Some(-3.0),
            ..Default::default()
        });
        assert_eq!(camera.distance(), Camera::MIN_DISTANCE);
        assert!(camera.view_matrix().invert().is_some());
    }

    #[test]
    fn eye_sits_behind_center_along_z() {
        let camera = Camera::new(0.0, 0.0, 4.0, Point3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(camera.eye(), Point3::new(1.0, 2.0, 7.0), epsilon = 1e-6);
    }

    #[test]
    fn partial_update_keeps_other_parameters() {
        let mut camera = Camera::new(0.3, 0.2, 6.0, Point3::new(1.0, 0.0, 0.0));
        camera.set_orbit(OrbitUpdate {
            zenith: Some(-0.4),
            ..Default::default()
        });
        assert_eq!(camera.azimuth(), 0.3);
        assert_eq!(camera.zenith(), -0.4);
        assert_eq!(camera.distance(), 6.0);
        assert_eq!(camera.center(), Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn wheel_zoom_stops_at_floor() {
        let controller = CameraController::default();
        let mut camera = Camera::new(0.0, 0.0, 2.5, Point3::origin());
        controller.handle_wheel(&mut camera, 1.0);
        controller.handle_wheel(&mut camera, 1.0);
        assert_eq!(camera.distance(), 1.0);
        controller.handle_wheel(&mut camera, -1.0);
        assert_eq!(camera.distance(), 2.0);
    }

    #[test]
    fn drag_deltas_are_normalised_by_window() {
        let controller = CameraController::default();
        let mut camera = Camera::default();
        controller.handle_pan(&mut camera, (400.0, -300.0), (800, 600));
        assert_relative_eq!(camera.center(), Point3::new(-0.5, 0.5, 0.0), epsilon = 1e-6);
        controller.handle_orbit(&mut camera, (80.0, 60.0), (800, 600));
        assert_relative_eq!(camera.azimuth(), -0.1, epsilon = 1e-6);
        assert_relative_eq!(camera.zenith(), -0.1, epsilon = 1e-6);
    }
}
