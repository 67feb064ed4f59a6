//! Matrix utilities over 4x4 homogeneous matrices.
//!
//! Convention used throughout the crate: vectors are columns and matrices
//! multiply from the left (`v' = M * v`), stored column-major as cgmath does.
//! A composition `A * B * C` therefore applies `C` first. The composition
//! *order* of the camera and of `PVM = P * V * M` is the contract; the
//! storage layout only matters when handing matrices to the GPU.

use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, Point3, SquareMatrix, Vector3};

/// Maps OpenGL clip space (z in [-w, w]) onto wgpu clip space (z in [0, w]).
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

pub fn translation(offset: Vector3<f32>) -> Matrix4<f32> {
    Matrix4::from_translation(offset)
}

/// Rotation about the X axis by `angle` radians (right-handed).
pub fn rotation_x(angle: f32) -> Matrix4<f32> {
    let (s, c) = angle.sin_cos();
    #[rustfmt::skip]
    let m = Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, c,   s,   0.0,
        0.0, -s,  c,   0.0,
        0.0, 0.0, 0.0, 1.0,
    );
    m
}

/// Rotation about the Y axis by `angle` radians (right-handed).
pub fn rotation_y(angle: f32) -> Matrix4<f32> {
    let (s, c) = angle.sin_cos();
    #[rustfmt::skip]
    let m = Matrix4::new(
        c,   0.0, -s,  0.0,
        0.0, 1.0, 0.0, 0.0,
        s,   0.0, c,   0.0,
        0.0, 0.0, 0.0, 1.0,
    );
    m
}

/// Rotation about the Z axis by `angle` radians (right-handed).
pub fn rotation_z(angle: f32) -> Matrix4<f32> {
    let (s, c) = angle.sin_cos();
    #[rustfmt::skip]
    let m = Matrix4::new(
        c,   s,   0.0, 0.0,
        -s,  c,   0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    );
    m
}

pub fn scale(factors: Vector3<f32>) -> Matrix4<f32> {
    Matrix4::from_nonuniform_scale(factors.x, factors.y, factors.z)
}

pub fn uniform_scale(factor: f32) -> Matrix4<f32> {
    Matrix4::from_scale(factor)
}

/// Places an object: scale first, then rotate about Y by `orientation`
/// radians, then translate to `position`.
pub fn pose(position: Vector3<f32>, orientation: f32, factors: Vector3<f32>) -> Matrix4<f32> {
    translation(position) * rotation_y(orientation) * scale(factors)
}

/// OpenGL-style perspective frustum (`glFrustum`). Depth maps to [-1, 1];
/// combine with [`OPENGL_TO_WGPU_MATRIX`] before uploading.
pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Matrix4<f32> {
    let rl = right - left;
    let tb = top - bottom;
    let fn_ = far - near;
    #[rustfmt::skip]
    let m = Matrix4::new(
        2.0 * near / rl,      0.0,                  0.0,                       0.0,
        0.0,                  2.0 * near / tb,      0.0,                       0.0,
        (right + left) / rl,  (top + bottom) / tb,  -(far + near) / fn_,       -1.0,
        0.0,                  0.0,                  -2.0 * far * near / fn_,   0.0,
    );
    m
}

/// Symmetric frustum from a vertical field of view in radians.
pub fn perspective(fovy: f32, aspect: f32, near: f32, far: f32) -> Matrix4<f32> {
    let top = near * (fovy / 2.0).tan();
    let right = top * aspect;
    frustum(-right, right, -top, top, near, far)
}

pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Matrix4<f32> {
    let rl = right - left;
    let tb = top - bottom;
    let fn_ = far - near;
    #[rustfmt::skip]
    let m = Matrix4::new(
        2.0 / rl,               0.0,                    0.0,                  0.0,
        0.0,                    2.0 / tb,               0.0,                  0.0,
        0.0,                    0.0,                    -2.0 / fn_,           0.0,
        -(right + left) / rl,   -(top + bottom) / tb,   -(far + near) / fn_,  1.0,
    );
    m
}

/// View matrix for an eye at `eye` looking at `center`.
///
/// The rotation has rows `(right, up', -forward)` where
/// `forward = normalize(center - eye)`, `right = normalize(forward x up)` and
/// `up' = right x forward`; it is applied after translating by `-eye`.
pub fn look_at(eye: Point3<f32>, center: Point3<f32>, up: Vector3<f32>) -> Matrix4<f32> {
    let f = (center - eye).normalize();
    let s = f.cross(up.normalize()).normalize();
    let u = s.cross(f);
    #[rustfmt::skip]
    let rotation = Matrix4::new(
        s.x, u.x, -f.x, 0.0,
        s.y, u.y, -f.y, 0.0,
        s.z, u.z, -f.z, 0.0,
        0.0, 0.0, 0.0,  1.0,
    );
    rotation * translation(Point3::new(0.0, 0.0, 0.0) - eye)
}

/// Keeps the rotation/scale block of `m` and zeroes its translation.
pub fn strip_translation(m: &Matrix4<f32>) -> Matrix4<f32> {
    let mut stripped = *m;
    stripped.w = cgmath::Vector4::new(0.0, 0.0, 0.0, 1.0);
    stripped
}

pub fn upper_left(m: &Matrix4<f32>) -> Matrix3<f32> {
    Matrix3::from_cols(m.x.truncate(), m.y.truncate(), m.z.truncate())
}

/// Inverse-transpose of the upper 3x3 block, used to transform normals.
///
/// Singular matrices fall back to the plain upper block.
pub fn normal_matrix(m: &Matrix4<f32>) -> Matrix3<f32> {
    let block = upper_left(m);
    match block.invert() {
        Some(inverse) => inverse.transpose(),
        None => {
            log::warn!("normal matrix requested for a singular transform");
            block
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Deg, Rad, Vector4};

    #[test]
    fn rotations_match_cgmath() {
        let angle = 0.7;
        assert_relative_eq!(rotation_x(angle), Matrix4::from_angle_x(Rad(angle)), epsilon = 1e-6);
        assert_relative_eq!(rotation_y(angle), Matrix4::from_angle_y(Rad(angle)), epsilon = 1e-6);
        assert_relative_eq!(rotation_z(angle), Matrix4::from_angle_z(Rad(angle)), epsilon = 1e-6);
    }

    #[test]
    fn frustum_matches_gl_reference() {
        let ours = frustum(-1.0, 1.0, -0.5, 0.5, 1.0, 200.0);
        let reference = cgmath::frustum(-1.0, 1.0, -0.5, 0.5, 1.0, 200.0);
        assert_relative_eq!(ours, reference, epsilon = 1e-6);
    }

    #[test]
    fn perspective_matches_cgmath() {
        let ours = perspective(Rad::from(Deg(45.0)).0, 4.0 / 3.0, 0.1, 100.0);
        let reference = cgmath::perspective(Deg(45.0), 4.0 / 3.0, 0.1, 100.0);
        assert_relative_eq!(ours, reference, epsilon = 1e-5);
    }

    #[test]
    fn orthographic_matches_cgmath() {
        let ours = orthographic(-2.0, 2.0, -1.0, 1.0, 0.5, 20.0);
        let reference = cgmath::ortho(-2.0, 2.0, -1.0, 1.0, 0.5, 20.0);
        assert_relative_eq!(ours, reference, epsilon = 1e-6);
    }

    #[test]
    fn look_at_matches_cgmath() {
        let eye = Point3::new(3.0, 2.0, 5.0);
        let center = Point3::new(0.5, -1.0, 0.0);
        let up = Vector3::unit_y();
        assert_relative_eq!(
            look_at(eye, center, up),
            Matrix4::look_at_rh(eye, center, up),
            epsilon = 1e-5
        );
    }

    #[test]
    fn pose_scales_then_rotates_then_translates() {
        let m = pose(
            Vector3::new(1.0, 2.0, 3.0),
            std::f32::consts::FRAC_PI_2,
            Vector3::new(2.0, 1.0, 1.0),
        );
        // x axis is scaled by 2, rotated onto -z, then moved.
        let p = m * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p, Vector4::new(1.0, 2.0, 1.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn strip_translation_keeps_rotation_only() {
        let m = translation(Vector3::new(4.0, 5.0, 6.0)) * rotation_y(0.3);
        let stripped = strip_translation(&m);
        assert_relative_eq!(stripped, rotation_y(0.3), epsilon = 1e-6);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let m = scale(Vector3::new(2.0, 1.0, 1.0));
        let n = normal_matrix(&m);
        assert_relative_eq!(n.x.x, 0.5, epsilon = 1e-6);
        assert_relative_eq!(n.y.y, 1.0, epsilon = 1e-6);
    }
}
