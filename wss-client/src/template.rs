//! List templates and record binding.

use wss_protocol::{PlayerRecord, PluginRecord};

use crate::markup;

pub const ITEM_TEMPLATE_CLASS: &str = "wssListItemTemplate";
pub const EMPTY_TEMPLATE_CLASS: &str = "wssEmptyListTemplate";
pub const OPERATOR_CLASS: &str = "wssPlayerIsOperator";
pub const NOT_OPERATOR_CLASS: &str = "wssPlayerIsNotOperator";

pub const NO_ITEM_TEMPLATE: &str = "No list item template was defined.";
pub const NO_EMPTY_TEMPLATE: &str = "No empty-list item template was defined.";

/// Lists the page can host, each with its own template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Players,
    Whitelist,
    OfflinePlayers,
    Plugins,
    /// Single-entry list for `player <name>`.
    PlayerProfile,
}

impl ListKind {
    /// Class of the container element on the page.
    pub fn container_class(self) -> &'static str {
        match self {
            ListKind::Players => "wssMinecraftPlayerList",
            ListKind::Whitelist => "wssMinecraftWhiteList",
            ListKind::OfflinePlayers => "wssMinecraftOfflineList",
            ListKind::Plugins => "wssMinecraftPluginList",
            ListKind::PlayerProfile => "wssMinecraftPlayer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ItemTemplate {
    open: String,
    body: String,
    close: String,
}

/// Item and empty-list fragments captured from a list container. Never
/// mutated after capture, every render works on clones.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    item: Option<ItemTemplate>,
    empty: Option<String>,
}

impl Template {
    pub fn capture(container: &str) -> Self {
        let item = markup::find_by_class(container, ITEM_TEMPLATE_CLASS, 0).map(|el| ItemTemplate {
            open: container[el.start..el.content_start].to_string(),
            body: container[el.content_start..el.content_end].trim().to_string(),
            close: container[el.content_end..el.end].to_string(),
        });
        let empty = markup::outer_by_class(container, EMPTY_TEMPLATE_CLASS).map(str::to_string);
        Self { item, empty }
    }

    pub fn has_item(&self) -> bool {
        self.item.is_some()
    }

    pub fn has_empty(&self) -> bool {
        self.empty.is_some()
    }

    /// Renders `items` through `bind`, or the empty template, or a diagnostic.
    pub fn render<T>(&self, items: &[T], mut bind: impl FnMut(&str, &T) -> String) -> String {
        let Some(item) = &self.item else {
            return NO_ITEM_TEMPLATE.to_string();
        };
        if items.is_empty() {
            return self
                .empty
                .clone()
                .unwrap_or_else(|| NO_EMPTY_TEMPLATE.to_string());
        }

        let mut out = item.open.clone();
        for entry in items {
            out.push_str(&bind(&item.body, entry));
        }
        out.push_str(&item.close);
        out
    }
}

pub fn face_canvas(canvas_id: &str) -> String {
    format!(
        r#"<canvas class="playersFace" id="{}"></canvas>"#,
        markup::escape(canvas_id)
    )
}

/// Binds one player into a clone of the item fragment.
pub fn bind_player(fragment: &str, player: &PlayerRecord, canvas_id: &str) -> String {
    let hidden = if player.is_operator {
        NOT_OPERATOR_CLASS
    } else {
        OPERATOR_CLASS
    };
    let mut html = markup::remove_by_class(fragment, hidden);

    let optional = |value: Option<String>| value.unwrap_or_default();
    let tokens = [
        ("#wssPlayerFace#", face_canvas(canvas_id)),
        ("#wssPlayerIsOperator#", player.is_operator.to_string()),
        ("#wssPlayerName#", markup::escape(&player.name)),
        ("#wssPlayerEnvironment#", markup::escape(&player.environment.tag())),
        ("#wssPlayerOnlineTime#", markup::escape(&player.presence_text())),
        ("#wssPlayerHealth#", optional(player.health.map(|v| v.to_string()))),
        ("#wssPlayerFoodLevel#", optional(player.food_level.map(|v| v.to_string()))),
        ("#wssPlayerExperience#", optional(player.experience.map(|v| v.to_string()))),
        ("#wssPlayerLevel#", optional(player.level.map(|v| v.to_string()))),
    ];
    for (token, value) in tokens {
        html = html.replace(token, &value);
    }

    html = markup::set_text_by_class(&html, "wssPlayerName", &player.name);
    html = markup::set_text_by_class(&html, "wssPlayerOnlineTime", &player.presence_text());
    html
}

pub fn bind_plugin(fragment: &str, plugin: &PluginRecord) -> String {
    let tokens = [
        ("#wssPluginName#", &plugin.name),
        ("#wssPluginVersion#", &plugin.version),
        ("#wssPluginAuthor#", &plugin.author),
        ("#wssPluginDescription#", &plugin.description),
    ];
    let mut html = fragment.to_string();
    for (token, value) in tokens {
        html = html.replace(token, &markup::escape(value));
    }
    html
}
