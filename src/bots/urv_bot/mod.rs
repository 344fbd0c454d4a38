use teloxide::dispatching::{DefaultKey, Dispatcher, UpdateFilterExt};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::RequestError;

use crate::context::AppContext;

mod handlers;
mod keyboards;
pub mod utils;

use handlers::{callback_handler, command_handler, message_handler, Command};

/// Builds the update dispatcher. Interrupts are handled by the caller, which
/// stops the dispatcher through its shutdown token.
pub fn build_dispatcher(ctx: AppContext) -> Dispatcher<Bot, RequestError, DefaultKey> {
    tracing::info!("Starting URV bot...");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint({
                    let ctx = ctx.clone();
                    move |bot: Bot, msg: Message, cmd: Command| {
                        let ctx = ctx.clone();
                        async move { command_handler(bot, msg, cmd, ctx).await }
                    }
                }),
        )
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint({
            let ctx = ctx.clone();
            move |bot: Bot, q: CallbackQuery| {
                let ctx = ctx.clone();
                async move { callback_handler(bot, q, ctx).await }
            }
        }));

    Dispatcher::builder(ctx.bot.clone(), handler).build()
}
