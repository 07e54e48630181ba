use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use roster_data::ChampionClass;
use std::path::Path;
use tracing::{debug, info, warn};

/// Side length of the normalized class icon buffers
pub const ICON_SIZE: u32 = 32;

/// Opaque backdrop for icons with transparency, close to the in-game card colour.
const ICON_BACKGROUND: Rgba<u8> = Rgba([40, 40, 40, 255]);

/// Reference class icons, normalized to 32x32 opaque RGBA.
#[derive(Debug, Clone, Default)]
pub struct ClassIconBank {
    icons: Vec<(ChampionClass, RgbaImage)>,
}

impl ClassIconBank {
    /// Load the class icons from `icons_dir/<class>.png`.
    /// Icons that are missing or unreadable are skipped with a warning.
    pub fn load(icons_dir: &Path) -> Self {
        let mut icons = Vec::new();
        for class in ChampionClass::ALL {
            let path = icons_dir.join(class.icon_file());
            if !path.exists() {
                warn!("Missing class icon for {}: {}", class, path.display());
                continue;
            }
            match load_icon(&path) {
                Ok(icon) => icons.push((class, icon)),
                Err(e) => warn!("Failed to load class icon for {}: {:#}", class, e),
            }
        }

        info!(
            "ClassIconBank loaded {} of {} icons from {}",
            icons.len(),
            ChampionClass::ALL.len(),
            icons_dir.display()
        );
        Self { icons }
    }

    /// Build a bank from already decoded icons.
    pub fn from_images(images: impl IntoIterator<Item = (ChampionClass, RgbaImage)>) -> Self {
        let icons = images
            .into_iter()
            .map(|(class, img)| (class, normalize_icon(&img)))
            .collect();
        Self { icons }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChampionClass, &RgbaImage)> {
        self.icons.iter().map(|(class, icon)| (*class, icon))
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }
}

fn load_icon(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    debug!("Loaded class icon {}", path.display());
    Ok(normalize_icon(&img.to_rgba8()))
}

/// Composite an icon onto the opaque backdrop and resize it to `ICON_SIZE` square.
pub fn normalize_icon(img: &RgbaImage) -> RgbaImage {
    let mut backdrop = RgbaImage::from_pixel(img.width(), img.height(), ICON_BACKGROUND);
    image::imageops::overlay(&mut backdrop, img, 0, 0);
    image::imageops::resize(
        &backdrop,
        ICON_SIZE,
        ICON_SIZE,
        image::imageops::FilterType::Triangle,
    )
}
