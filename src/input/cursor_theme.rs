use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use xcursor::parser::{parse_xcursor, Image};
use xcursor::CursorTheme;

/// Fallback 1x1 transparent cursor frame, used when the theme is missing an icon.
fn fallback_image() -> Rc<CursorImage> {
    Rc::new(CursorImage {
        frames: vec![Image {
            size: 32,
            width: 1,
            height: 1,
            xhot: 0,
            yhot: 0,
            delay: 0,
            pixels_rgba: vec![0, 0, 0, 0],
            pixels_argb: vec![],
        }],
        animation_duration: 0,
    })
}

/// Frames of one cursor icon.
#[derive(Debug)]
pub struct CursorImage {
    pub frames: Vec<Image>,
    /// Total duration of the animation in milliseconds. Zero for static cursors.
    pub animation_duration: u32,
}

/// Loads and caches xcursor theme images.
pub struct CursorThemeManager {
    image_cache: RefCell<HashMap<String, Rc<CursorImage>>>,
    cursor_theme: CursorTheme,
    cursor_theme_name: String,
    cursor_theme_size: u32,
}

impl std::fmt::Debug for CursorThemeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorThemeManager")
            .field("cursor_theme_name", &self.cursor_theme_name)
            .field("cursor_theme_size", &self.cursor_theme_size)
            .finish_non_exhaustive()
    }
}

impl CursorThemeManager {
    pub fn new(config: &hayward_config::Cursor) -> Self {
        let cursor_theme = CursorTheme::load(&config.name);

        // Clients reading the environment should agree with us on the theme.
        std::env::set_var("XCURSOR_THEME", &config.name);
        std::env::set_var("XCURSOR_SIZE", config.size.to_string());

        Self {
            image_cache: RefCell::new(HashMap::new()),
            cursor_theme,
            cursor_theme_name: config.name.clone(),
            cursor_theme_size: config.size,
        }
    }

    /// Re-load the theme if the configured name or size changed.
    pub fn reload(&mut self, config: &hayward_config::Cursor) {
        if self.cursor_theme_name == config.name && self.cursor_theme_size == config.size {
            return;
        }

        std::env::set_var("XCURSOR_THEME", &config.name);
        std::env::set_var("XCURSOR_SIZE", config.size.to_string());

        self.cursor_theme = CursorTheme::load(&config.name);
        self.cursor_theme_name = config.name.clone();
        self.cursor_theme_size = config.size;
        self.image_cache.borrow_mut().clear();
    }

    pub fn size(&self) -> u32 {
        self.cursor_theme_size
    }

    /// Load (or fetch from cache) the frames for a named cursor icon, for example "left_ptr".
    pub fn load_image(&self, name: &str) -> Rc<CursorImage> {
        if let Some(image) = self.image_cache.borrow().get(name) {
            return Rc::clone(image);
        }

        let image = self
            .load_image_uncached(name)
            .unwrap_or_else(|| {
                warn!(name, theme = self.cursor_theme_name, "Missing cursor icon");
                fallback_image()
            });
        self.image_cache
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&image));
        image
    }

    fn load_image_uncached(&self, name: &str) -> Option<Rc<CursorImage>> {
        let path = self.cursor_theme.load_icon(name)?;
        let data = std::fs::read(path).ok()?;
        let mut frames = parse_xcursor(&data)?;

        // Keep the frames closest to the configured size.
        let nominal = self.cursor_theme_size;
        let best = frames
            .iter()
            .map(|frame| frame.size.abs_diff(nominal))
            .min()?;
        frames.retain(|frame| frame.size.abs_diff(nominal) == best);

        let animation_duration = frames.iter().map(|frame| frame.delay).sum();
        Some(Rc::new(CursorImage {
            frames,
            animation_duration,
        }))
    }
}
