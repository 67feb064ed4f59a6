mod common;

use std::path::PathBuf;

use cgmath::Vector3;
use orbit_ngin::{
    data_structures::cube_map::{self, CubeFace, CubeMap},
    error::NginError,
    passes::SkyBox,
    render::RecordingBackend,
};

/// Writes the five faces other than `-Z` as solid PNGs under the default names.
fn five_faces_on_disk(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("orbit-ngin-cube-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    for (i, (face, file)) in cube_map::default_face_files().into_iter().enumerate() {
        if face == CubeFace::NegativeZ {
            continue;
        }
        common::solid([40 * i as u8, 0, 0, 255]).save(dir.join(file)).unwrap();
    }
    dir
}

#[test]
fn loaded_faces_sample_back_their_colour() {
    let dir = five_faces_on_disk("sample");
    let files = cube_map::default_face_files();
    let cube_map = CubeMap::load(&dir, &files[..5]).unwrap();

    for (i, face) in CubeFace::ALL[..5].iter().enumerate() {
        let texel = cube_map.sample(face.direction()).unwrap();
        assert_eq!(texel.0[0], 40 * i as u8, "face {face}");
    }
}

#[test]
fn missing_face_file_is_a_load_error() {
    let dir = five_faces_on_disk("missing-file");
    let result = CubeMap::load(&dir, &cube_map::default_face_files());
    assert!(matches!(result, Err(NginError::ResourceLoad { .. })));
}

#[test]
fn skybox_rejects_an_incomplete_cube_map() {
    let dir = five_faces_on_disk("incomplete");
    let files = cube_map::default_face_files();
    let cube_map = CubeMap::load(&dir, &files[..5]).unwrap();
    assert!(!cube_map.is_complete());

    let mut backend = RecordingBackend::new(64, 64);
    match SkyBox::new(&mut backend, cube_map, 100.0) {
        Err(NginError::MissingFace { face, .. }) => assert_eq!(face, CubeFace::NegativeZ),
        Err(other) => panic!("expected a missing face, got {other}"),
        Ok(_) => panic!("an incomplete cube map must not upload"),
    }
    assert_eq!(backend.live_textures(), 0);
}

#[test]
fn solid_faces_are_told_apart_by_direction() {
    let cube_map = common::coloured_cube_map();
    let red = cube_map.sample(Vector3::new(3.0, 0.2, -0.1)).unwrap();
    let blue = cube_map.sample(Vector3::new(0.0, 1.0, 0.0)).unwrap();
    let magenta = cube_map.sample(Vector3::new(0.4, -0.4, -2.0)).unwrap();
    assert_eq!(red.0, [255, 0, 0, 255]);
    assert_eq!(blue.0, [0, 0, 255, 255]);
    assert_eq!(magenta.0, [255, 0, 255, 255]);
}

#[test]
fn uploaded_cube_map_is_released_once() {
    let mut backend = RecordingBackend::new(64, 64);
    let mut cube_map = common::coloured_cube_map();
    let first = cube_map.upload(&mut backend).unwrap();
    let second = cube_map.upload(&mut backend).unwrap();
    assert_eq!(first, second);
    assert_eq!(backend.live_textures(), 1);

    cube_map.release(&mut backend);
    assert_eq!(backend.live_textures(), 0);
    assert!(cube_map.texture().is_err());
}
