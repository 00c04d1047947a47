//! Resolution of image descriptors into decoded images.
//!
//! A descriptor is a map with a `type` discriminator:
//!
//! - `fromAssetImage` with `assetName`, an image bundled with the application,
//! - `fromBytes` with `rawImageData`, an encoded (PNG, JPEG) image.
//!
//! Resolution never fails. Anything that cannot be resolved becomes an empty placeholder, so
//! that bad data never breaks the rendering of the rest of the map.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use egui::ColorImage;
use image::ImageError;

use crate::value::Fields;

/// Source of images referenced by placemark icons.
pub trait ImageLoader {
    /// Image bundled with the application under `name`.
    fn asset(&self, name: &str) -> Option<ColorImage>;

    /// Decode an encoded image.
    fn decode(&self, bytes: &[u8]) -> Option<ColorImage> {
        match decode_image(bytes) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Failed to decode image: {e}.");
                None
            }
        }
    }
}

/// Decode PNG or JPEG bytes into egui's [`ColorImage`].
///
/// # Errors
///
/// Returns the decoder's error if the format is unknown or the data is corrupted.
pub fn decode_image(bytes: &[u8]) -> Result<ColorImage, ImageError> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    let pixels = image.as_flat_samples();
    Ok(ColorImage::from_rgba_unmultiplied(
        [image.width() as _, image.height() as _],
        pixels.as_slice(),
    ))
}

/// Where [`AssetBundle`] looks for assets.
#[derive(Debug, Clone)]
pub struct AssetOptions {
    /// Directory the application is installed in.
    pub root: PathBuf,

    /// Subdirectory of `root` holding the bundled assets. Asset names are relative to it.
    pub key_prefix: String,
}

impl Default for AssetOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            key_prefix: "flutter_assets".to_owned(),
        }
    }
}

/// [`ImageLoader`] reading assets from the application's bundle on disk.
#[derive(Debug, Clone, Default)]
pub struct AssetBundle {
    options: AssetOptions,
}

impl AssetBundle {
    pub fn new(options: AssetOptions) -> Self {
        Self { options }
    }

    /// Path at which the asset with the given name is stored. `None` if the name points
    /// outside of the bundle.
    pub fn lookup_key(&self, asset_name: &str) -> Option<PathBuf> {
        let name = Path::new(asset_name);
        if !name
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        {
            log::warn!("Asset '{asset_name}' is outside of the bundle.");
            return None;
        }

        Some(
            self.options
                .root
                .join(&self.options.key_prefix)
                .join(name),
        )
    }
}

impl ImageLoader for AssetBundle {
    fn asset(&self, name: &str) -> Option<ColorImage> {
        let path = self.lookup_key(name)?;
        match std::fs::read(&path) {
            Ok(bytes) => self.decode(&bytes),
            Err(e) => {
                log::warn!("Could not read asset '{}': {}.", path.display(), e);
                None
            }
        }
    }
}

/// Resolve an image descriptor, falling back to an empty placeholder.
pub fn resolve_image(descriptor: Fields<'_>, loader: &dyn ImageLoader) -> ColorImage {
    let image = match descriptor.get::<&str>("type") {
        Some("fromAssetImage") => match descriptor.get::<&str>("assetName") {
            Some(name) => loader.asset(name),
            None => {
                log::warn!("Asset image without an asset name.");
                None
            }
        },
        Some("fromBytes") => match descriptor.get::<Cow<'_, [u8]>>("rawImageData") {
            Some(bytes) => loader.decode(&bytes),
            None => {
                log::warn!("Bytes image without any data.");
                None
            }
        },
        Some(other) => {
            log::warn!("Unknown image type '{other}'.");
            None
        }
        None => {
            log::warn!("Image type is missing.");
            None
        }
    };

    image.unwrap_or_else(|| {
        log::debug!("Using a placeholder image.");
        ColorImage::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Params, Value, params_from_json};
    use image::{ImageFormat, Rgba, RgbaImage};
    use serde_json::json;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Loader without any assets.
    struct NoAssets;

    impl ImageLoader for NoAssets {
        fn asset(&self, _name: &str) -> Option<ColorImage> {
            None
        }
    }

    #[test]
    fn decoding_png() {
        let image = decode_image(&png(3, 2)).unwrap();
        assert_eq!(image.size, [3, 2]);
        assert_eq!(image.pixels[0], egui::Color32::RED);
    }

    #[test]
    fn resolving_bytes() {
        let mut descriptor = Params::new();
        descriptor.insert("type".to_owned(), Value::from("fromBytes"));
        descriptor.insert("rawImageData".to_owned(), Value::Bytes(png(4, 4)));

        let image = resolve_image(Fields::new(&descriptor, "image"), &NoAssets);
        assert_eq!(image.size, [4, 4]);
    }

    #[test]
    fn unresolvable_images_become_placeholders() {
        let _ = env_logger::try_init();

        for descriptor in [
            json!({"type": "fromBytes", "rawImageData": [1, 2, 3]}),
            json!({"type": "fromBytes"}),
            json!({"type": "fromAssetImage", "assetName": "missing.png"}),
            json!({"type": "fromAssetImage"}),
            json!({"type": "fromSomewhereElse"}),
            json!({}),
        ] {
            let descriptor = params_from_json(descriptor).unwrap();
            let image = resolve_image(Fields::new(&descriptor, "image"), &NoAssets);
            assert_eq!(image, ColorImage::default());
        }
    }

    #[test]
    fn asset_lookup_key() {
        let bundle = AssetBundle::new(AssetOptions {
            root: PathBuf::from("/app"),
            key_prefix: "assets".to_owned(),
        });

        assert_eq!(
            bundle.lookup_key("icons/pin.png"),
            Some(PathBuf::from("/app/assets/icons/pin.png"))
        );
    }

    #[test]
    fn assets_outside_of_the_bundle_are_refused() {
        let _ = env_logger::try_init();

        let outside = std::env::temp_dir()
            .join(format!("placemarks-outside-{}.png", std::process::id()));
        std::fs::write(&outside, png(7, 3)).unwrap();

        let bundle = AssetBundle::new(AssetOptions {
            root: PathBuf::from("/nonexistent/app"),
            ..Default::default()
        });

        let absolute = outside.to_str().unwrap();
        assert_eq!(bundle.lookup_key(absolute), None);
        assert!(bundle.asset(absolute).is_none());
        assert_eq!(bundle.lookup_key("../../etc/pin.png"), None);
        assert_eq!(bundle.lookup_key("icons/../../pin.png"), None);

        let descriptor =
            params_from_json(json!({"type": "fromAssetImage", "assetName": absolute})).unwrap();
        let image = resolve_image(Fields::new(&descriptor, "image"), &bundle);
        assert_eq!(image.size, [0, 0]);

        std::fs::remove_file(outside).unwrap();
    }

    #[test]
    fn loading_assets_from_disk() {
        let root = std::env::temp_dir().join(format!("placemarks-assets-{}", std::process::id()));
        std::fs::create_dir_all(root.join("flutter_assets")).unwrap();
        std::fs::write(root.join("flutter_assets/pin.png"), png(2, 5)).unwrap();

        let bundle = AssetBundle::new(AssetOptions {
            root: root.clone(),
            ..Default::default()
        });

        assert_eq!(bundle.asset("pin.png").map(|image| image.size), Some([2, 5]));
        assert!(bundle.asset("other.png").is_none());

        std::fs::remove_dir_all(root).unwrap();
    }
}
