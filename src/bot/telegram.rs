//! Telegram transport: [`Messenger`] over a teloxide `Bot`, and the update
//! dispatcher feeding the platform-neutral handlers.

use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton,
    KeyboardMarkup, MessageId, ParseMode, Recipient, ReplyMarkup, UserId,
};
use teloxide::{ApiError, RequestError};

use crate::bot::messenger::{
    ButtonAction, InlineKeyboard, Markup, Media, Messenger, SendError,
};
use crate::bot::{BotContext, IncomingCallback, IncomingMessage, handle_callback, handle_message};
use crate::users::UserProfile;

fn classify(err: RequestError) -> SendError {
    match err {
        RequestError::Api(ApiError::BotBlocked | ApiError::UserDeactivated) => SendError::Blocked,
        other => SendError::Other(other.to_string()),
    }
}

fn inline_markup(keyboard: &InlineKeyboard) -> Result<InlineKeyboardMarkup, SendError> {
    let mut rows = Vec::with_capacity(keyboard.rows.len());
    for row in &keyboard.rows {
        let mut buttons = Vec::with_capacity(row.len());
        for button in row {
            buttons.push(match &button.action {
                ButtonAction::Callback(data) => {
                    InlineKeyboardButton::callback(button.text.clone(), data.clone())
                }
                ButtonAction::Url(url) => {
                    let url = reqwest::Url::parse(url).map_err(|e| {
                        SendError::Other(format!("invalid button url {url:?}: {e}"))
                    })?;
                    InlineKeyboardButton::url(button.text.clone(), url)
                }
            });
        }
        rows.push(buttons);
    }
    Ok(InlineKeyboardMarkup::new(rows))
}

fn reply_markup(markup: &Markup) -> Result<ReplyMarkup, SendError> {
    Ok(match markup {
        Markup::Inline(keyboard) => ReplyMarkup::InlineKeyboard(inline_markup(keyboard)?),
        Markup::Menu(menu) => ReplyMarkup::Keyboard(
            KeyboardMarkup::new(
                menu.rows
                    .iter()
                    .map(|row| row.iter().map(KeyboardButton::new).collect::<Vec<_>>())
                    .collect::<Vec<_>>(),
            )
            .resize_keyboard(),
        ),
    })
}

fn input_file(media: &Media) -> Result<InputFile, SendError> {
    match media {
        Media::Url(url) => reqwest::Url::parse(url)
            .map(InputFile::url)
            .map_err(|e| SendError::Other(format!("invalid media url {url:?}: {e}"))),
        Media::FileId(id) => Ok(InputFile::file_id(id.clone())),
    }
}

/// `@name` for public channels, otherwise a numeric chat id.
fn channel_recipient(channel: &str) -> Result<Recipient, SendError> {
    if channel.starts_with('@') {
        return Ok(Recipient::ChannelUsername(channel.to_string()));
    }
    channel
        .parse::<i64>()
        .map(|id| Recipient::Id(ChatId(id)))
        .map_err(|_| SendError::Other(format!("invalid channel id {channel:?}")))
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<i32, SendError> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(reply_markup(&markup)?);
        }
        let sent = request.await.map_err(classify)?;
        Ok(sent.id.0)
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: &Media,
        caption: &str,
        markup: Option<Markup>,
    ) -> Result<i32, SendError> {
        let mut request = self
            .bot
            .send_photo(ChatId(chat_id), input_file(photo)?)
            .caption(caption)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(reply_markup(&markup)?);
        }
        let sent = request.await.map_err(classify)?;
        Ok(sent.id.0)
    }

    async fn send_animation(
        &self,
        chat_id: i64,
        animation: &Media,
        caption: &str,
        markup: Option<Markup>,
    ) -> Result<i32, SendError> {
        let mut request = self
            .bot
            .send_animation(ChatId(chat_id), input_file(animation)?)
            .caption(caption)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(reply_markup(&markup)?);
        }
        let sent = request.await.map_err(classify)?;
        Ok(sent.id.0)
    }

    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), SendError> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(inline_markup(&keyboard)?);
        }
        request.await.map_err(classify)?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), SendError> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), SendError> {
        let mut request = self.bot.answer_callback_query(callback_id.to_string());
        if let Some(text) = text {
            request = request.text(text).show_alert(alert);
        }
        request.await.map_err(classify)?;
        Ok(())
    }

    async fn is_channel_member(&self, channel: &str, user_id: i64) -> Result<bool, SendError> {
        let member = self
            .bot
            .get_chat_member(channel_recipient(channel)?, UserId(user_id as u64))
            .await
            .map_err(classify)?;
        Ok(member.is_present())
    }
}

fn profile(user: &teloxide::types::User) -> UserProfile {
    UserProfile {
        id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
    }
}

async fn on_message(msg: Message, ctx: Arc<BotContext>) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let incoming = IncomingMessage {
        chat_id: msg.chat.id.0,
        from: profile(from),
        text: msg.text().map(String::from),
        photo: msg
            .photo()
            .and_then(|sizes| sizes.last())
            .map(|p| p.file.id.to_string()),
        caption: msg.caption().map(String::from),
    };
    handle_message(&ctx, &incoming).await;
    Ok(())
}

async fn on_callback(q: CallbackQuery, ctx: Arc<BotContext>) -> ResponseResult<()> {
    let incoming = IncomingCallback {
        id: q.id.to_string(),
        from: profile(&q.from),
        data: q.data.clone().unwrap_or_default(),
        message: q.message.as_ref().map(|m| (m.chat().id.0, m.id().0)),
    };
    handle_callback(&ctx, &incoming).await;
    Ok(())
}

/// Long-polls Telegram until the process is interrupted.
pub async fn run_dispatcher(bot: Bot, ctx: Arc<BotContext>) {
    tracing::info!("starting Telegram dispatcher");
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    tracing::info!("Telegram dispatcher stopped");
}
