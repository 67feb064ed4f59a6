use approx::assert_relative_eq;
use cgmath::{Matrix4, Point3, SquareMatrix, Vector3};
use orbit_ngin::{
    camera::{Camera, OrbitUpdate},
    math,
};

const AZIMUTHS: [f32; 5] = [-3.0, -0.7, 0.0, 1.2, 4.0];
const ZENITHS: [f32; 5] = [-1.5, -0.4, 0.0, 0.9, 1.5];

#[test]
fn view_is_invertible_for_orbit_parameters() {
    for azimuth in AZIMUTHS {
        for zenith in ZENITHS {
            for distance in [0.5, 5.0, 120.0] {
                let camera = Camera::new(azimuth, zenith, distance, Point3::new(1.0, -2.0, 3.0));
                let view = camera.view_matrix();
                let inverse = view.invert().expect("view must be invertible");
                assert_relative_eq!(view * inverse, Matrix4::identity(), epsilon = 1e-3);
            }
        }
    }
}

#[test]
fn non_positive_distance_keeps_view_invertible() {
    let mut camera = Camera::default();
    for distance in [0.0, -4.0] {
        camera.set_orbit(OrbitUpdate {
            distance: Some(distance),
            ..Default::default()
        });
        assert_eq!(camera.distance(), Camera::MIN_DISTANCE);
        assert!(camera.view_matrix().invert().is_some());
    }
}

#[test]
fn default_camera_is_a_translation_along_minus_z() {
    let camera = Camera::new(0.0, 0.0, 5.0, Point3::new(0.0, 0.0, 0.0));
    assert_relative_eq!(
        camera.view_matrix(),
        math::translation(Vector3::new(0.0, 0.0, -5.0)),
        epsilon = 1e-6
    );
}

#[test]
fn orbit_view_matches_look_at_from_the_eye() {
    for azimuth in AZIMUTHS {
        for zenith in [-1.2, -0.4, 0.0, 0.9, 1.2] {
            let camera = Camera::new(azimuth, zenith, 7.0, Point3::new(-1.0, 0.5, 2.0));
            let look_at = math::look_at(camera.eye(), camera.center(), camera.up());
            assert_relative_eq!(camera.view_matrix(), look_at, epsilon = 1e-4);
        }
    }
}

#[test]
fn center_maps_to_the_point_in_front_of_the_eye() {
    let camera = Camera::new(0.8, -0.3, 6.0, Point3::new(2.0, 1.0, -4.0));
    let center = camera.view_matrix() * camera.center().to_homogeneous();
    assert_relative_eq!(center.truncate(), Vector3::new(0.0, 0.0, -6.0), epsilon = 1e-4);
}
