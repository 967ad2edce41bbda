use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Callback(String),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

/// Buttons attached under a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<Button>>,
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    pub fn single(button: Button) -> Self {
        Self {
            rows: vec![vec![button]],
        }
    }

    #[cfg(test)]
    pub fn callbacks(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().filter_map(|b| match &b.action {
            ButtonAction::Callback(data) => Some(data.as_str()),
            ButtonAction::Url(_) => None,
        })
    }
}

/// Persistent reply keyboard replacing the text input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuKeyboard {
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    Inline(InlineKeyboard),
    Menu(MenuKeyboard),
}

impl From<InlineKeyboard> for Markup {
    fn from(k: InlineKeyboard) -> Self {
        Markup::Inline(k)
    }
}

impl From<MenuKeyboard> for Markup {
    fn from(k: MenuKeyboard) -> Self {
        Markup::Menu(k)
    }
}

/// Photo or animation source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    Url(String),
    /// Id of a file already uploaded to the chat platform.
    FileId(String),
}

/// Escapes text for interpolation into HTML message bodies.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("recipient blocked the bot or was deactivated")]
    Blocked,
    #[error("send failed: {0}")]
    Other(String),
}

/// Outgoing side of the chat platform. All text is HTML.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Returns the id of the sent message.
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<i32, SendError>;

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: &Media,
        caption: &str,
        markup: Option<Markup>,
    ) -> Result<i32, SendError>;

    async fn send_animation(
        &self,
        chat_id: i64,
        animation: &Media,
        caption: &str,
        markup: Option<Markup>,
    ) -> Result<i32, SendError>;

    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), SendError>;

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), SendError>;

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), SendError>;

    async fn is_channel_member(&self, channel: &str, user_id: i64) -> Result<bool, SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<b>"Tom & Jerry"</b>"#),
            "&lt;b&gt;&quot;Tom &amp; Jerry&quot;&lt;/b&gt;"
        );
        assert_eq!(escape_html("Иван"), "Иван");
    }

    #[test]
    fn callbacks_skip_url_buttons() {
        let kb = InlineKeyboard::new(vec![
            vec![Button::url("pay", "https://pay.example")],
            vec![Button::callback("check", "check_pay:1")],
        ]);
        assert_eq!(kb.callbacks().collect::<Vec<_>>(), vec!["check_pay:1"]);
    }
}
