use std::sync::Arc;

use teloxide::{
    dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler},
    prelude::*,
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, LabeledPrice, User, UserId},
    utils::command::BotCommands,
};

use crate::flow::{Flow, Inbound, Outbound, UserRef};

pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type HandlerResult = Result<(), HandlerError>;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "welcome, subscription status and plans")]
    Start,
    #[command(description = "choose a plan and pay")]
    Subscribe,
    #[command(description = "list the plans")]
    Plans,
    #[command(description = "show this help")]
    Help,
}

pub fn schema() -> UpdateHandler<HandlerError> {
    let messages = Update::filter_message()
        .branch(
            dptree::filter_map(|msg: Message| payment_inbound(&msg)).endpoint(successful_payment),
        )
        .branch(dptree::entry().filter_command::<Command>().endpoint(command));

    dptree::entry()
        .branch(messages)
        .branch(Update::filter_callback_query().endpoint(callback))
        .branch(Update::filter_pre_checkout_query().endpoint(pre_checkout))
}

fn user_ref(user: &User) -> UserRef {
    UserRef {
        id: user.id.0,
        first_name: user.first_name.clone(),
        username: user.username.clone(),
    }
}

fn pre_checkout_inbound(q: &PreCheckoutQuery) -> Inbound {
    Inbound::PreCheckout {
        user: user_ref(&q.from),
        payload: q.invoice_payload.clone(),
        currency: q.currency.clone(),
        total_amount: i64::from(q.total_amount),
    }
}

/// `None` unless the message reports a completed payment by a known user.
fn payment_inbound(msg: &Message) -> Option<Inbound> {
    let payment = msg.successful_payment()?;
    let user = msg.from.as_ref()?;
    Some(Inbound::PaymentSucceeded {
        user: user_ref(user),
        payload: payment.invoice_payload.clone(),
        charge_id: payment.telegram_payment_charge_id.to_string(),
    })
}

async fn command(bot: Bot, msg: Message, cmd: Command, flow: Arc<Flow>) -> HandlerResult {
    let Some(user) = msg.from.as_ref().map(user_ref) else {
        return Ok(());
    };
    log::info!("Command {:?} from user {}", cmd, user.id);

    let inbound = match cmd {
        Command::Start => Inbound::Start(user),
        Command::Subscribe | Command::Plans => Inbound::ShowPlans(user),
        Command::Help => Inbound::Help,
    };
    render(&bot, msg.chat.id, flow.handle(inbound).await).await
}

async fn callback(bot: Bot, q: CallbackQuery, flow: Arc<Flow>) -> HandlerResult {
    // stops the client-side spinner whatever happens next
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    log::info!("Callback `{}` from user {}", data, q.from.id);

    // plan keyboards are only sent in the private chat with the user
    let chat_id = ChatId::from(q.from.id);
    let outs = flow
        .handle(Inbound::Callback {
            user: user_ref(&q.from),
            data,
        })
        .await;
    render(&bot, chat_id, outs).await
}

async fn pre_checkout(bot: Bot, q: PreCheckoutQuery, flow: Arc<Flow>) -> HandlerResult {
    log::info!(
        "Pre-checkout `{}` from user {} for {} {}",
        q.invoice_payload,
        q.from.id,
        q.total_amount,
        q.currency
    );

    let outs = flow.handle(pre_checkout_inbound(&q)).await;

    for out in outs {
        match out {
            Outbound::PreCheckoutAnswer(Ok(())) => {
                bot.answer_pre_checkout_query(q.id.clone(), true).await?;
            }
            Outbound::PreCheckoutAnswer(Err(reason)) => {
                bot.answer_pre_checkout_query(q.id.clone(), false)
                    .error_message(reason)
                    .await?;
            }
            other => log::warn!("Unexpected pre-checkout action {:?}", other),
        }
    }
    Ok(())
}

async fn successful_payment(
    bot: Bot,
    msg: Message,
    inbound: Inbound,
    flow: Arc<Flow>,
) -> HandlerResult {
    if let Inbound::PaymentSucceeded { user, charge_id, .. } = &inbound {
        log::info!("Payment {} received from user {}", charge_id, user.id);
    }
    let outs = flow.handle(inbound).await;
    render(&bot, msg.chat.id, outs).await
}

async fn render(bot: &Bot, chat_id: ChatId, outs: Vec<Outbound>) -> HandlerResult {
    for out in outs {
        match out {
            Outbound::Text(text) => {
                bot.send_message(chat_id, text).await?;
            }
            Outbound::Choices { text, buttons } => {
                let rows: Vec<Vec<InlineKeyboardButton>> = buttons
                    .into_iter()
                    .map(|b| vec![InlineKeyboardButton::callback(b.label, b.data)])
                    .collect();
                bot.send_message(chat_id, text)
                    .reply_markup(InlineKeyboardMarkup::new(rows))
                    .await?;
            }
            Outbound::Invoice(invoice) => {
                // Stars invoices carry no provider token
                bot.send_invoice(
                    ChatId::from(UserId(invoice.user_id)),
                    invoice.title,
                    invoice.description,
                    invoice.payload,
                    invoice.currency,
                    vec![LabeledPrice::new(invoice.label, invoice.amount)],
                )
                .await?;
            }
            Outbound::PreCheckoutAnswer(_) => {
                log::warn!("Pre-checkout answer outside of a pre-checkout query");
            }
        }
    }
    Ok(())
}
