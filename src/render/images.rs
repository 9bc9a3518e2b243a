use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(usize);

/// A decoded image, flattened onto white and stored as 8-bit RGB.
#[derive(Clone, Debug)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl LoadedImage {
    /// Height over width.
    pub fn aspect(&self) -> f32 {
        self.height as f32 / self.width.max(1) as f32
    }
}

/// Images used by one document. Each path is decoded at most once; failures are
/// remembered too so a broken file is reported once per document.
#[derive(Default)]
pub struct ImageStore {
    images: Vec<LoadedImage>,
    by_path: HashMap<PathBuf, std::result::Result<ImageId, String>>,
}

impl ImageStore {
    pub fn load(&mut self, path: &Path) -> Result<ImageId> {
        if let Some(outcome) = self.by_path.get(path) {
            return outcome.clone().map_err(|e| anyhow!(e));
        }

        let outcome = match decode(path) {
            Ok(image) => {
                log::debug!(
                    "Loaded image {} ({}×{})",
                    path.display(),
                    image.width,
                    image.height
                );
                self.images.push(image);
                Ok(ImageId(self.images.len() - 1))
            }
            Err(e) => Err(format!("{e:#}")),
        };
        self.by_path.insert(path.to_path_buf(), outcome.clone());
        outcome.map_err(|e| anyhow!(e))
    }

    pub fn get(&self, id: ImageId) -> Option<&LoadedImage> {
        self.images.get(id.0)
    }
}

fn decode(path: &Path) -> Result<LoadedImage> {
    if !path.is_file() {
        return Err(anyhow!("Image not found: {}", path.display()));
    }
    let image = image::open(path)
        .with_context(|| format!("Failed to decode image {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(anyhow!("Image {} is empty", path.display()));
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        for channel in [r, g, b] {
            // composite over white
            rgb.push(((channel as u32 * alpha + 255 * (255 - alpha)) / 255) as u8);
        }
    }

    Ok(LoadedImage {
        path: path.to_path_buf(),
        width,
        height,
        rgb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_load_and_flatten_png() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let path = dir.path().join("dot.png");
        let mut img = image::RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([0, 0, 0, 0]));
        img.save(&path).expect("can write png");

        let mut store = ImageStore::default();
        let id = store.load(&path).expect("image loads");
        let image = store.get(id).expect("image is stored");
        assert_eq!((image.width, image.height), (2, 1));
        assert_eq!(image.rgb, vec![255, 0, 0, 255, 255, 255]);
        assert_eq!(store.load(&path).expect("cached"), id);
    }

    #[test]
    fn missing_images_are_reported_every_time() {
        let mut store = ImageStore::default();
        let path = Path::new("nowhere/missing.png");
        let err = store.load(path).expect_err("missing image fails");
        assert!(err.to_string().starts_with("Image not found"));
        assert!(store.load(path).is_err());
    }
}
