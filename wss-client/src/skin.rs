//! Player face rendering from Minecraft skins.
//!
//! A face is resolved through a fixed chain:
//! - a resolved cache entry is drawn without touching the network
//! - forced default skins and invalid names go straight to the default skin
//! - otherwise a loading placeholder is drawn, then the image server is tried
//!   with CORS, then without, then the default skin is used
//!
//! Every successful attempt overwrites the cache entry and redraws once.

use std::future::Future;
use std::sync::Arc;

use base64::prelude::*;
use image::{GenericImageView, Rgba, RgbaImage, imageops};
use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
use scc::HashMap;
use scc::hash_map::Entry;
use tracing::{debug, info};
use wss_protocol::PlayerName;

use crate::config::Config;
use crate::page::Page;
use crate::validation::player_name;

/// Default Steve skin (embedded at compile time).
pub const DEFAULT_SKIN: &[u8] = include_bytes!("../assets/default_skin.png");

/// How a skin request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Sends an `Origin` and requires the response to allow it.
    Cors,
    NoCors,
}

/// Where skins come from.
pub trait SkinSource: Send + Sync + 'static {
    fn fetch(
        &self,
        url: &str,
        mode: FetchMode,
    ) -> impl Future<Output = Result<Vec<u8>, SkinError>> + Send;
}

/// Skin source backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpSkinSource {
    http: reqwest::Client,
    origin: String,
}

impl HttpSkinSource {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            origin: origin.into(),
        }
    }
}

impl SkinSource for HttpSkinSource {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<Vec<u8>, SkinError> {
        let mut request = self.http.get(url);
        if mode == FetchMode::Cors {
            request = request.header(ORIGIN, self.origin.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SkinError::Fetch(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SkinError::Fetch(format!("image server answered {status}")));
        }

        if mode == FetchMode::Cors {
            let allowed = response
                .headers()
                .get(ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|value| value.to_str().ok());
            if !matches!(allowed, Some(origin) if origin == "*" || origin == self.origin) {
                return Err(SkinError::CorsRejected);
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SkinError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Cached skin for one player.
#[derive(Debug, Clone)]
pub struct SkinCacheEntry {
    pub image: Arc<RgbaImage>,
    /// The placeholder drawn while the real skin loads.
    pub preloaded: bool,
}

#[derive(Debug, Clone)]
struct SkinSettings {
    image_server_url: String,
    force_default: bool,
    smoothing: bool,
    show_placeholder: bool,
}

pub struct SkinResolver<S> {
    source: S,
    cache: HashMap<PlayerName, SkinCacheEntry>,
    default_skin: Arc<RgbaImage>,
    placeholder: Arc<RgbaImage>,
    settings: SkinSettings,
}

impl<S: SkinSource> SkinResolver<S> {
    /// Fails when a custom default skin is configured but cannot be loaded.
    pub fn new(source: S, config: &Config) -> Result<Self, SkinError> {
        let default_skin = load_default_skin(config.default_skin.as_deref())?;
        Ok(Self {
            source,
            cache: HashMap::new(),
            default_skin: Arc::new(default_skin),
            placeholder: Arc::new(loading_placeholder()),
            settings: SkinSettings {
                image_server_url: config.image_server_url.clone(),
                force_default: config.force_default_skin,
                smoothing: config.image_smoothing,
                show_placeholder: config.show_loading_placeholder,
            },
        })
    }

    pub fn default_skin(&self) -> &Arc<RgbaImage> {
        &self.default_skin
    }

    pub fn placeholder(&self) -> &Arc<RgbaImage> {
        &self.placeholder
    }

    pub async fn cached(&self, player: &str) -> Option<SkinCacheEntry> {
        let key = PlayerName::from(player).ok()?;
        self.cache.read_async(&key, |_, entry| entry.clone()).await
    }

    /// Draw `player`'s face into `canvas_id`.
    pub async fn resolve(&self, page: &dyn Page, canvas_id: &str, player: &str) {
        let key = match player_name(player) {
            Ok(key) => key,
            Err(e) => {
                debug!(player, error = %e, "not fetching skin for invalid name");
                self.draw(page, canvas_id, &self.default_skin);
                return;
            }
        };

        let resolved = self
            .cache
            .read_async(&key, |_, entry| (!entry.preloaded).then(|| Arc::clone(&entry.image)))
            .await
            .flatten();
        if let Some(skin) = resolved {
            self.draw(page, canvas_id, &skin);
            return;
        }

        if self.settings.force_default {
            self.store(key, Arc::clone(&self.default_skin)).await;
            self.draw(page, canvas_id, &self.default_skin);
            return;
        }

        if self.settings.show_placeholder {
            let placeholder = SkinCacheEntry {
                image: Arc::clone(&self.placeholder),
                preloaded: true,
            };
            // Only fills an empty slot, a resolved skin is never downgraded.
            let _ = self.cache.insert_async(key, placeholder).await;
            self.draw(page, canvas_id, &self.placeholder);
        }

        let url = format!("{}{}.png", self.settings.image_server_url, player);
        for mode in [FetchMode::Cors, FetchMode::NoCors] {
            let attempt = self
                .source
                .fetch(&url, mode)
                .await
                .and_then(|bytes| decode_skin(&bytes));
            match attempt {
                Ok(skin) => {
                    let skin = Arc::new(skin);
                    self.store(key, Arc::clone(&skin)).await;
                    self.draw(page, canvas_id, &skin);
                    return;
                }
                Err(e) => debug!(player, ?mode, error = %e, "skin attempt failed"),
            }
        }

        info!(player, "falling back to the default skin");
        self.store(key, Arc::clone(&self.default_skin)).await;
        self.draw(page, canvas_id, &self.default_skin);
    }

    async fn store(&self, key: PlayerName, image: Arc<RgbaImage>) {
        let entry = SkinCacheEntry {
            image,
            preloaded: false,
        };
        match self.cache.entry_async(key).await {
            Entry::Occupied(mut occupied) => *occupied.get_mut() = entry,
            Entry::Vacant(vacant) => {
                vacant.insert_entry(entry);
            }
        }
    }

    fn draw(&self, page: &dyn Page, canvas_id: &str, skin: &RgbaImage) {
        let Some(size) = page.canvas_size(canvas_id) else {
            debug!(canvas = canvas_id, "canvas gone before its face was drawn");
            return;
        };
        page.draw(canvas_id, render_face(skin, size, self.settings.smoothing));
    }
}

/// Decode a skin PNG, rejecting anything but 64x64 and 64x32.
pub fn decode_skin(bytes: &[u8]) -> Result<RgbaImage, SkinError> {
    let skin = image::load_from_memory(bytes).map_err(|e| SkinError::ImageLoad(e.to_string()))?;

    let (width, height) = skin.dimensions();
    if width != 64 || (height != 64 && height != 32) {
        return Err(SkinError::InvalidSkinDimensions { width, height });
    }
    Ok(skin.to_rgba8())
}

/// Crop the 8x8 face at (8, 8) and scale it to the canvas.
///
/// Nearest-neighbor keeps the pixelated Minecraft look, smoothing uses a
/// triangle filter.
pub fn render_face(skin: &RgbaImage, (width, height): (u32, u32), smoothing: bool) -> RgbaImage {
    let face = imageops::crop_imm(skin, 8, 8, 8, 8).to_image();
    let filter = if smoothing {
        imageops::FilterType::Triangle
    } else {
        imageops::FilterType::Nearest
    };
    imageops::resize(&face, width.max(1), height.max(1), filter)
}

/// Grey checkered face shown while a skin loads.
pub fn loading_placeholder() -> RgbaImage {
    RgbaImage::from_fn(64, 32, |x, y| {
        if (8..16).contains(&x) && (8..16).contains(&y) {
            let shade = if (x + y) % 2 == 0 { 96 } else { 128 };
            Rgba([shade, shade, shade, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// The embedded skin, or a custom one given as a `data:` URI or file path.
pub fn load_default_skin(custom: Option<&str>) -> Result<RgbaImage, SkinError> {
    let Some(source) = custom else {
        return decode_skin(DEFAULT_SKIN);
    };

    let bytes = match source.strip_prefix("data:") {
        Some(uri) => {
            let (meta, data) = uri
                .split_once(',')
                .ok_or_else(|| SkinError::InvalidDataUri("missing ','".to_string()))?;
            if !meta.ends_with(";base64") {
                return Err(SkinError::InvalidDataUri("not base64 encoded".to_string()));
            }
            BASE64_STANDARD
                .decode(data.trim())
                .map_err(|e| SkinError::InvalidDataUri(e.to_string()))?
        }
        None => std::fs::read(source).map_err(|e| SkinError::Io(e.to_string()))?,
    };
    decode_skin(&bytes)
}

/// Errors that can occur while loading a skin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkinError {
    /// Request failed or the server refused
    Fetch(String),
    /// CORS request whose response does not allow our origin
    CorsRejected,
    /// Failed to load image from memory
    ImageLoad(String),
    /// Invalid skin dimensions
    InvalidSkinDimensions { width: u32, height: u32 },
    InvalidDataUri(String),
    Io(String),
}

impl std::fmt::Display for SkinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkinError::Fetch(e) => write!(f, "failed to fetch skin: {}", e),
            SkinError::CorsRejected => write!(f, "image server did not allow our origin"),
            SkinError::ImageLoad(e) => write!(f, "failed to load image: {}", e),
            SkinError::InvalidSkinDimensions { width, height } => {
                write!(
                    f,
                    "invalid skin dimensions: {}x{} (expected 64x64 or 64x32)",
                    width, height
                )
            }
            SkinError::InvalidDataUri(e) => write!(f, "invalid data URI: {}", e),
            SkinError::Io(e) => write!(f, "failed to read skin file: {}", e),
        }
    }
}

impl std::error::Error for SkinError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png(image: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_embedded_default_skin_decodes() {
        let skin = load_default_skin(None).unwrap();
        assert_eq!(skin.dimensions(), (64, 32));
    }

    #[test]
    fn test_invalid_data_rejected() {
        assert!(matches!(decode_skin(b"not a valid png"), Err(SkinError::ImageLoad(_))));

        let head = png(&RgbaImage::new(8, 8));
        assert_eq!(
            decode_skin(&head),
            Err(SkinError::InvalidSkinDimensions {
                width: 8,
                height: 8
            })
        );
    }

    #[test]
    fn test_data_uri_default_skin() {
        let skin = RgbaImage::from_pixel(64, 64, Rgba([10, 20, 30, 255]));
        let uri = format!("data:image/png;base64,{}", BASE64_STANDARD.encode(png(&skin)));
        assert_eq!(load_default_skin(Some(&uri)).unwrap(), skin);

        assert!(matches!(
            load_default_skin(Some("data:image/png,raw")),
            Err(SkinError::InvalidDataUri(_))
        ));
        assert!(matches!(
            load_default_skin(Some("/definitely/not/here.png")),
            Err(SkinError::Io(_))
        ));
    }

    #[test]
    fn test_render_face_crops_and_scales() {
        let mut skin = RgbaImage::new(64, 32);
        skin.put_pixel(8, 8, Rgba([255, 0, 0, 255]));
        skin.put_pixel(15, 15, Rgba([0, 0, 255, 255]));

        let face = render_face(&skin, (32, 32), false);

        assert_eq!(face.dimensions(), (32, 32));
        assert_eq!(face.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(face.get_pixel(3, 3), &Rgba([255, 0, 0, 255]));
        assert_eq!(face.get_pixel(31, 31), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_placeholder_differs_from_default() {
        let default = load_default_skin(None).unwrap();
        let placeholder = loading_placeholder();
        assert_ne!(
            render_face(&default, (8, 8), false),
            render_face(&placeholder, (8, 8), false)
        );
    }
}
