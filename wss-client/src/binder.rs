//! Pushes aggregates onto the page.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use wss_protocol::{PlayerRecord, PluginRecord, ServerInfo, Summary};

use crate::helpers::{day_phase, strip_formatting};
use crate::page::Page;
use crate::skin::{SkinResolver, SkinSource};
use crate::template::{self, ListKind, Template};

/// Owns the captured templates and the canvas counter of one client.
pub struct Binder<S> {
    page: Arc<dyn Page>,
    skins: Arc<SkinResolver<S>>,
    templates: Mutex<HashMap<ListKind, Template>>,
    canvas_counter: AtomicU64,
}

impl<S: SkinSource> Binder<S> {
    pub fn new(page: Arc<dyn Page>, skins: Arc<SkinResolver<S>>) -> Self {
        Self {
            page,
            skins,
            templates: Mutex::new(HashMap::new()),
            canvas_counter: AtomicU64::new(0),
        }
    }

    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    pub fn skins(&self) -> &Arc<SkinResolver<S>> {
        &self.skins
    }

    /// Template for `list`, captured from the page once its container exists.
    pub fn template(&self, list: ListKind) -> Template {
        let mut templates = self.templates.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(captured) = templates.get(&list) {
            return captured.clone();
        }

        let Some(markup) = self.page.list_template(list) else {
            debug!(list = list.container_class(), "list container not on the page yet");
            return Template::default();
        };
        let captured = Template::capture(&markup);
        debug!(
            list = list.container_class(),
            item = captured.has_item(),
            empty = captured.has_empty(),
            "template captured"
        );
        templates.insert(list, captured.clone());
        captured
    }

    /// Renders players into `list` and starts resolving their faces.
    pub fn bind_players(&self, list: ListKind, players: &[PlayerRecord]) {
        let list_template = self.template(list);
        let mut faces = Vec::new();
        let markup = list_template.render(players, |fragment, player| {
            let canvas_id = self.next_canvas_id(&player.name);
            let html = template::bind_player(fragment, player, &canvas_id);
            if html.contains(&canvas_id) {
                faces.push((canvas_id, player.name.clone()));
            }
            html
        });
        self.page.render_list(list, markup);

        for (canvas_id, name) in faces {
            let skins = Arc::clone(&self.skins);
            let page = Arc::clone(&self.page);
            tokio::spawn(async move {
                skins.resolve(page.as_ref(), &canvas_id, &name).await;
            });
        }
    }

    pub fn bind_plugins(&self, plugins: &[PluginRecord]) {
        let markup = self
            .template(ListKind::Plugins)
            .render(plugins, template::bind_plugin);
        self.page.render_list(ListKind::Plugins, markup);
    }

    pub fn bind_server_info(&self, info: &ServerInfo, lobby_time: Option<i64>) {
        let flag = |value: bool| value.to_string();
        let fields = [
            ("wssMinecraftServerName", info.server_name.clone()),
            ("wssMinecraftServerType", info.name.clone()),
            ("wssMinecraftVersion", info.version.clone()),
            ("wssMinecraftBukkitVersion", info.bukkit_version.clone()),
            ("wssMinecraftMOTD", strip_formatting(&info.motd)),
            ("wssMinecraftWorldType", info.world_type.clone()),
            ("wssMinecraftGameMode", info.game_mode.clone()),
            ("wssMinecraftIsWhiteListed", flag(info.is_white_listed)),
            ("wssMinecraftAllowsNether", flag(info.allows_nether)),
            ("wssMinecraftAllowsEnd", flag(info.allows_end)),
            ("wssMinecraftAllowsFlight", flag(info.allows_flight)),
            (
                "wssMinecraftPort",
                info.port.map(|port| port.to_string()).unwrap_or_default(),
            ),
            ("wssMinecraftIPAddress", info.ip_address.clone()),
        ];
        for (class, text) in fields {
            self.page.set_field(class, text);
        }

        if let Some(time) = lobby_time.or(info.server_time) {
            self.page.set_field("wssMinecraftTime", day_phase(time).to_string());
        }
    }

    pub fn bind_counts(&self, list: ListKind, summary: &Summary, records: usize) {
        match list {
            ListKind::Players => {
                if let Some(max) = summary.max_players {
                    self.page
                        .set_field("wssMinecraftMaxNumberOfPlayers", max.to_string());
                }
                self.page.set_field(
                    "wssMinecraftTotalPlayersOnline",
                    summary.total_online.to_string(),
                );
            }
            ListKind::Whitelist => self
                .page
                .set_field("wssTotalWhitelistedPlayers", records.to_string()),
            ListKind::OfflinePlayers => self
                .page
                .set_field("wssTotalOfflinePlayers", records.to_string()),
            ListKind::Plugins | ListKind::PlayerProfile => {}
        }
    }

    /// Fresh canvas id. Only name characters valid in a player name are kept.
    fn next_canvas_id(&self, player: &str) -> String {
        let n = self.canvas_counter.fetch_add(1, Ordering::Relaxed);
        let name: String = player
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        format!("canvas{n}{name}")
    }
}
