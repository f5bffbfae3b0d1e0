use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
#[error("failed to load texture {path}: {source}")]
pub struct TextureError {
    pub path: PathBuf,
    #[source]
    pub source: image::ImageError,
}

/// RGBA8 texture, decoded from an image file or generated procedurally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Tightly packed rows of `width * 4` bytes.
    pub pixels: Vec<u8>,
}

impl Texture {
    pub fn from_fn(
        name: impl Into<String>,
        width: u32,
        height: u32,
        mut texel: impl FnMut(u32, u32) -> [u8; 4],
    ) -> Self {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&texel(x, y));
            }
        }
        Self {
            name: name.into(),
            width,
            height,
            pixels,
        }
    }

    /// Decode any image format `image` was built with, converted to RGBA8.
    pub fn load(path: &Path) -> Result<Self, TextureError> {
        let decoded = image::open(path).map_err(|source| TextureError {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("texture");
        let texture = Self::from_rgba(name, decoded.to_rgba8());
        debug!(path = %path.display(), width = texture.width, height = texture.height, "loaded texture");
        Ok(texture)
    }

    pub fn from_image_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self, image::ImageError> {
        Ok(Self::from_rgba(name, image::load_from_memory(bytes)?.to_rgba8()))
    }

    fn from_rgba(name: impl Into<String>, rgba: image::RgbaImage) -> Self {
        let (width, height) = rgba.dimensions();
        Self {
            name: name.into(),
            width,
            height,
            pixels: rgba.into_raw(),
        }
    }

    pub fn solid(name: impl Into<String>, color: [u8; 4]) -> Self {
        Self::from_fn(name, 4, 4, |_, _| color)
    }

    pub fn checker(name: impl Into<String>, size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let cell = (size / cells.max(1)).max(1);
        Self::from_fn(name, size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                a
            } else {
                b
            }
        })
    }

    /// Running-bond bricks with light mortar lines.
    pub fn bricks(name: impl Into<String>, size: u32) -> Self {
        let brick_h = (size / 8).max(2);
        let brick_w = brick_h * 2;
        Self::from_fn(name, size, size, |x, y| {
            let row = y / brick_h;
            let shifted = x + (row % 2) * (brick_w / 2);
            let mortar = y % brick_h == 0 || shifted % brick_w == 0;
            if mortar {
                [200, 200, 190, 255]
            } else {
                let shade = ((row * 37 + shifted / brick_w * 53) % 40) as u8;
                [150 + shade, 60 + shade / 2, 45, 255]
            }
        })
    }

    /// Wire mesh with fully transparent holes, drawn by the alpha-tested pass.
    pub fn wire_fence(name: impl Into<String>, size: u32) -> Self {
        let spacing = (size / 8).max(2);
        Self::from_fn(name, size, size, |x, y| {
            let on_wire = (x + y) % spacing == 0 || (x + size - y) % spacing == 0;
            if on_wire {
                [170, 170, 175, 255]
            } else {
                [0, 0, 0, 0]
            }
        })
    }

    /// Pale blue with faint diagonal streaks.
    pub fn ice(name: impl Into<String>, size: u32) -> Self {
        Self::from_fn(name, size, size, |x, y| {
            let streak = ((x * 3 + y * 5) % 17) as u8;
            [200 + streak, 225 + streak / 2, 245, 255]
        })
    }

    pub fn row_pitch(&self) -> usize {
        self.width as usize * 4
    }

    pub fn has_transparency(&self) -> bool {
        self.pixels.chunks_exact(4).any(|texel| texel[3] < 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_textures_are_tightly_packed() {
        for texture in [
            Texture::solid("white", [255; 4]),
            Texture::checker("checker", 64, 8, [255; 4], [0, 0, 0, 255]),
            Texture::bricks("bricks", 64),
            Texture::wire_fence("fence", 64),
            Texture::ice("ice", 64),
        ] {
            assert_eq!(
                texture.pixels.len(),
                texture.row_pitch() * texture.height as usize,
                "{}",
                texture.name
            );
        }
    }

    #[test]
    fn only_the_fence_has_holes() {
        assert!(Texture::wire_fence("fence", 64).has_transparency());
        assert!(!Texture::bricks("bricks", 64).has_transparency());
        assert!(!Texture::ice("ice", 64).has_transparency());
    }

    fn png(width: u32, height: u32, texel: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
        let image = image::RgbaImage::from_fn(width, height, |x, y| image::Rgba(texel(x, y)));
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn png_decodes_to_packed_rgba() {
        let bytes = png(3, 2, |x, y| [x as u8 * 100, y as u8 * 100, 7, 200]);
        let texture = Texture::from_image_bytes("tile", &bytes).unwrap();
        assert_eq!((texture.width, texture.height), (3, 2));
        assert_eq!(texture.pixels.len(), texture.row_pitch() * 2);
        assert_eq!(&texture.pixels[4..8], &[100, 0, 7, 200]);
        assert_eq!(&texture.pixels[12..16], &[0, 100, 7, 200]);
        assert!(texture.has_transparency());
    }

    #[test]
    fn load_reads_the_file_and_names_it_after_the_stem() {
        let path = std::env::temp_dir().join(format!("frame_pipeline_{}_crate.png", std::process::id()));
        std::fs::write(&path, png(2, 2, |_, _| [9, 8, 7, 255])).unwrap();
        let texture = Texture::load(&path);
        std::fs::remove_file(&path).unwrap();

        let texture = texture.unwrap();
        assert_eq!(texture.name, format!("frame_pipeline_{}_crate", std::process::id()));
        assert_eq!(&texture.pixels[..4], &[9, 8, 7, 255]);
    }

    #[test]
    fn missing_or_corrupt_files_are_errors() {
        let error = Texture::load(Path::new("no/such/texture.png")).unwrap_err();
        assert_eq!(error.path, PathBuf::from("no/such/texture.png"));
        assert!(Texture::from_image_bytes("junk", b"not an image").is_err());
    }

    #[test]
    fn checker_alternates_cells() {
        let texture = Texture::checker("checker", 4, 2, [255; 4], [0, 0, 0, 255]);
        assert_eq!(&texture.pixels[0..4], &[255; 4]);
        assert_eq!(&texture.pixels[8..12], &[0, 0, 0, 255]);
    }
}
