//! Cube maps: six square images addressed by direction.
//!
//! A [`CubeMap`] keeps its faces on the CPU until it is uploaded. Faces can be
//! given in memory or loaded from a folder; a cube map with any face missing
//! cannot be uploaded or bound.

use std::{fmt, path::Path};

use cgmath::{Point3, Vector3};
use image::{Rgba, RgbaImage};

use crate::{
    data_structures::texture::{Texture, TextureKind},
    error::{NginError, Result},
    render::RenderBackend,
    resources,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    /// Faces in GPU layer order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// File name used when none is given.
    pub fn default_file(&self) -> &'static str {
        match self {
            CubeFace::PositiveX => "px.png",
            CubeFace::NegativeX => "nx.png",
            CubeFace::PositiveY => "py.png",
            CubeFace::NegativeY => "ny.png",
            CubeFace::PositiveZ => "pz.png",
            CubeFace::NegativeZ => "nz.png",
        }
    }

    /// Direction a camera looks along to render this face.
    pub fn direction(&self) -> Vector3<f32> {
        match self {
            CubeFace::PositiveX => Vector3::unit_x(),
            CubeFace::NegativeX => -Vector3::unit_x(),
            CubeFace::PositiveY => Vector3::unit_y(),
            CubeFace::NegativeY => -Vector3::unit_y(),
            CubeFace::PositiveZ => Vector3::unit_z(),
            CubeFace::NegativeZ => -Vector3::unit_z(),
        }
    }

    /// Up vector matching the cube map texel orientation of this face.
    pub fn up(&self) -> Vector3<f32> {
        match self {
            CubeFace::PositiveY => Vector3::unit_z(),
            CubeFace::NegativeY => -Vector3::unit_z(),
            _ => -Vector3::unit_y(),
        }
    }

    pub fn view_from(&self, position: Point3<f32>) -> cgmath::Matrix4<f32> {
        crate::math::look_at(position, position + self.direction(), self.up())
    }
}

impl fmt::Display for CubeFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CubeFace::PositiveX => "+X",
            CubeFace::NegativeX => "-X",
            CubeFace::PositiveY => "+Y",
            CubeFace::NegativeY => "-Y",
            CubeFace::PositiveZ => "+Z",
            CubeFace::NegativeZ => "-Z",
        };
        f.write_str(name)
    }
}

/// File names for each face, relative to the folder passed to [`CubeMap::load`].
pub fn default_face_files() -> [(CubeFace, &'static str); 6] {
    CubeFace::ALL.map(|face| (face, face.default_file()))
}

#[derive(Clone, Debug)]
pub struct CubeMap {
    name: String,
    faces: [Option<RgbaImage>; 6],
    texture: Option<Texture>,
}

impl CubeMap {
    /// A cube map with no faces yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            faces: Default::default(),
            texture: None,
        }
    }

    /// Faces in [`CubeFace::ALL`] order.
    pub fn from_faces(name: impl Into<String>, faces: [RgbaImage; 6]) -> Self {
        Self {
            name: name.into(),
            faces: faces.map(Some),
            texture: None,
        }
    }

    /// Reads each listed face from `folder`. Faces not listed stay missing.
    pub fn load<S: AsRef<str>>(folder: impl AsRef<Path>, files: &[(CubeFace, S)]) -> Result<Self> {
        let folder = folder.as_ref();
        let mut cube_map = Self::new(folder.display().to_string());
        for (face, file) in files {
            let image = resources::load_image(folder.join(file.as_ref()))?;
            cube_map.set_face(*face, image);
        }
        log::info!(
            "loaded cube map '{}' with {} of 6 faces",
            cube_map.name,
            cube_map.faces.iter().flatten().count()
        );
        Ok(cube_map)
    }

    pub fn set_face(&mut self, face: CubeFace, image: RgbaImage) {
        self.faces[face.index()] = Some(image);
    }

    pub fn face(&self, face: CubeFace) -> Option<&RgbaImage> {
        self.faces[face.index()].as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn missing_face(&self) -> Option<CubeFace> {
        CubeFace::ALL
            .into_iter()
            .find(|face| self.faces[face.index()].is_none())
    }

    pub fn is_complete(&self) -> bool {
        self.missing_face().is_none()
    }

    fn check_complete(&self) -> Result<[&RgbaImage; 6]> {
        let mut faces = Vec::with_capacity(6);
        for face in CubeFace::ALL {
            let image = self.face(face).ok_or_else(|| NginError::MissingFace {
                cube_map: self.name.clone(),
                face,
            })?;
            faces.push(image);
        }
        let size = faces[0].dimensions();
        if size.0 != size.1 || faces.iter().any(|image| image.dimensions() != size) {
            return Err(NginError::resource(
                &self.name,
                "cube map faces must be square and equally sized",
            ));
        }
        Ok([faces[0], faces[1], faces[2], faces[3], faces[4], faces[5]])
    }

    /// Uploads the six faces. Fails with `MissingFace` if any face is absent.
    pub fn upload(&mut self, backend: &mut dyn RenderBackend) -> Result<Texture> {
        if let Some(texture) = &self.texture {
            return Ok(texture.clone());
        }
        let faces = self.check_complete()?;
        let id = backend.upload_cube_map(&self.name, faces)?;
        let texture = Texture::new(self.name.clone(), id, TextureKind::Cube);
        self.texture = Some(texture.clone());
        Ok(texture)
    }

    /// The uploaded texture, for binding. Fails if the map is incomplete or
    /// was never uploaded.
    pub fn texture(&self) -> Result<&Texture> {
        if let Some(face) = self.missing_face() {
            return Err(NginError::MissingFace {
                cube_map: self.name.clone(),
                face,
            });
        }
        self.texture
            .as_ref()
            .ok_or_else(|| NginError::resource(&self.name, "cube map was not uploaded"))
    }

    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(texture) = self.texture.take() {
            backend.release_texture(texture.id);
        }
    }

    /// Nearest-texel lookup in the direction `direction`.
    pub fn sample(&self, direction: Vector3<f32>) -> Result<Rgba<u8>> {
        let (face, s, t) = face_coordinates(direction);
        let image = self.face(face).ok_or_else(|| NginError::MissingFace {
            cube_map: self.name.clone(),
            face,
        })?;
        let (width, height) = image.dimensions();
        let x = ((s * width as f32) as u32).min(width.saturating_sub(1));
        let y = ((t * height as f32) as u32).min(height.saturating_sub(1));
        Ok(*image.get_pixel(x, y))
    }
}

/// Major-axis face selection with texel coordinates in `[0, 1]`, origin top-left.
pub fn face_coordinates(direction: Vector3<f32>) -> (CubeFace, f32, f32) {
    let (x, y, z) = (direction.x, direction.y, direction.z);
    let (ax, ay, az) = (x.abs(), y.abs(), z.abs());
    let (face, sc, tc, ma) = if ax >= ay && ax >= az {
        if x >= 0.0 {
            (CubeFace::PositiveX, -z, -y, ax)
        } else {
            (CubeFace::NegativeX, z, -y, ax)
        }
    } else if ay >= az {
        if y >= 0.0 {
            (CubeFace::PositiveY, x, z, ay)
        } else {
            (CubeFace::NegativeY, x, -z, ay)
        }
    } else if z >= 0.0 {
        (CubeFace::PositiveZ, x, -y, az)
    } else {
        (CubeFace::NegativeZ, -x, -y, az)
    };
    let ma = if ma > 0.0 { ma } else { 1.0 };
    (face, 0.5 * (sc / ma + 1.0), 0.5 * (tc / ma + 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(4, 4, Rgba([value, 0, 0, 255]))
    }

    #[test]
    fn major_axis_picks_face() {
        assert_eq!(face_coordinates(Vector3::new(2.0, 0.5, -1.0)).0, CubeFace::PositiveX);
        assert_eq!(face_coordinates(Vector3::new(0.1, -3.0, 1.0)).0, CubeFace::NegativeY);
        assert_eq!(face_coordinates(Vector3::new(0.1, 0.2, -0.9)).0, CubeFace::NegativeZ);
    }

    #[test]
    fn face_center_maps_to_image_center() {
        let (_, s, t) = face_coordinates(Vector3::new(0.0, 0.0, 1.0));
        assert_eq!((s, t), (0.5, 0.5));
    }

    #[test]
    fn each_face_is_sampled_from_its_own_image() {
        let faces = [solid(10), solid(20), solid(30), solid(40), solid(50), solid(60)];
        let cube_map = CubeMap::from_faces("solid", faces);
        for (i, face) in CubeFace::ALL.into_iter().enumerate() {
            let texel = cube_map.sample(face.direction()).unwrap();
            assert_eq!(texel.0[0], 10 * (i as u8 + 1), "face {face}");
        }
    }

    #[test]
    fn missing_face_is_reported() {
        let mut cube_map = CubeMap::new("partial");
        for face in &CubeFace::ALL[..5] {
            cube_map.set_face(*face, solid(1));
        }
        assert_eq!(cube_map.missing_face(), Some(CubeFace::NegativeZ));
        match cube_map.texture() {
            Err(NginError::MissingFace { face, .. }) => assert_eq!(face, CubeFace::NegativeZ),
            other => panic!("expected missing face, got {other:?}"),
        }
    }
}
