//! The page the client renders into.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use image::RgbaImage;
use tracing::{debug, info};

use crate::template::ListKind;

/// Rendering surface. The client only ever talks to the page through this.
pub trait Page: Send + Sync {
    /// Markup of the list container, read once per list to capture its template.
    fn list_template(&self, list: ListKind) -> Option<String>;

    /// Replaces the rendered content of a list and shows it.
    fn render_list(&self, list: ListKind, markup: String);

    /// Sets the text of every element carrying `class`.
    fn set_field(&self, class: &str, text: String);

    /// Connected/disconnected indicator driven by ping.
    fn set_online(&self, online: bool);

    /// Declared size of a canvas, `None` once it left the page.
    fn canvas_size(&self, canvas_id: &str) -> Option<(u32, u32)>;

    fn draw(&self, canvas_id: &str, image: RgbaImage);
}

#[derive(Debug, Default)]
struct PageState {
    templates: HashMap<ListKind, String>,
    template_reads: HashMap<ListKind, usize>,
    lists: HashMap<ListKind, String>,
    fields: HashMap<String, String>,
    online: Option<bool>,
    canvases: HashMap<String, (u32, u32)>,
    draws: Vec<(String, RgbaImage)>,
}

/// In-memory page. Logs what it renders and keeps it for inspection.
pub struct MemoryPage {
    canvas_size: (u32, u32),
    state: Mutex<PageState>,
}

impl MemoryPage {
    /// Every canvas that appears in rendered markup gets `canvas_size`.
    pub fn new(canvas_size: (u32, u32)) -> Self {
        Self {
            canvas_size,
            state: Mutex::new(PageState::default()),
        }
    }

    pub fn with_template(self, list: ListKind, markup: impl Into<String>) -> Self {
        self.lock().templates.insert(list, markup.into());
        self
    }

    pub fn list(&self, list: ListKind) -> Option<String> {
        self.lock().lists.get(&list).cloned()
    }

    pub fn field(&self, class: &str) -> Option<String> {
        self.lock().fields.get(class).cloned()
    }

    pub fn online(&self) -> Option<bool> {
        self.lock().online
    }

    pub fn template_reads(&self, list: ListKind) -> usize {
        self.lock().template_reads.get(&list).copied().unwrap_or(0)
    }

    pub fn draws(&self) -> Vec<(String, RgbaImage)> {
        self.lock().draws.clone()
    }

    pub fn draws_for(&self, canvas_id: &str) -> Vec<RgbaImage> {
        self.lock()
            .draws
            .iter()
            .filter(|(id, _)| id == canvas_id)
            .map(|(_, image)| image.clone())
            .collect()
    }

    /// Ids of canvases currently on the page.
    pub fn canvas_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().canvases.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Page for MemoryPage {
    fn list_template(&self, list: ListKind) -> Option<String> {
        let mut state = self.lock();
        *state.template_reads.entry(list).or_default() += 1;
        state.templates.get(&list).cloned()
    }

    fn render_list(&self, list: ListKind, markup: String) {
        let mut state = self.lock();
        let ids = canvas_ids_in(&markup);
        for id in ids {
            state.canvases.insert(id, self.canvas_size);
        }
        info!(list = list.container_class(), "{markup}");
        state.lists.insert(list, markup);
    }

    fn set_field(&self, class: &str, text: String) {
        debug!(field = class, "{text}");
        self.lock().fields.insert(class.to_string(), text);
    }

    fn set_online(&self, online: bool) {
        let mut state = self.lock();
        if state.online != Some(online) {
            info!(online, "server status changed");
        }
        state.online = Some(online);
    }

    fn canvas_size(&self, canvas_id: &str) -> Option<(u32, u32)> {
        self.lock().canvases.get(canvas_id).copied()
    }

    fn draw(&self, canvas_id: &str, image: RgbaImage) {
        debug!(canvas = canvas_id, "face drawn");
        self.lock().draws.push((canvas_id.to_string(), image));
    }
}

fn canvas_ids_in(markup: &str) -> Vec<String> {
    const MARKER: &str = r#"class="playersFace" id=""#;
    markup
        .match_indices(MARKER)
        .filter_map(|(at, _)| {
            let rest = &markup[at + MARKER.len()..];
            rest.find('"').map(|end| rest[..end].to_string())
        })
        .collect()
}
