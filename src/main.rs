mod config;
mod quiz;
mod render;

use std::sync::Arc;

use chatgpt::{
    client::ChatGPT,
    config::{ChatGPTEngine, ModelConfiguration},
};
use config::{Config, ConfigError};
use dotenv::dotenv;
use quiz::{
    backend::ChatGptBackend,
    controller::{Action, Controller},
    generator::QuestionGenerator,
    session::ChatSession,
};
use teloxide::{
    dispatching::dialogue::{ErasedStorage, InMemStorage, Storage},
    prelude::*,
    types::{ChatAction, KeyboardMarkup, ParseMode},
    utils::command::BotCommands,
};

type QuizDialogue = Dialogue<ChatSession, ErasedStorage<ChatSession>>;
type SessionStorage = Arc<ErasedStorage<ChatSession>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "show the welcome message and topics.")]
    Start,
    #[command(description = "display this text.")]
    Help,
    #[command(description = "ask a question on the current topic.")]
    Quiz,
    #[command(description = "show your score.")]
    Score,
    #[command(description = "choose a topic.")]
    Topics,
    #[command(description = "clear your score and history.")]
    Reset,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    pretty_env_logger::init();
    log::info!("Starting interview prep bot...");

    if let Err(err) = run().await {
        log::error!("{err}");
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ConfigError> {
    let config = Config::from_env()?;

    let gpt = ChatGPT::new_with_config(
        &config.api_token,
        ModelConfiguration {
            // chatgpt_rs wants a 'static engine name; this runs once per process
            engine: ChatGPTEngine::Custom(Box::leak(config.model_id.clone().into_boxed_str())),
            api_url: config.api_url.clone(),
            timeout: config.timeout,
            ..Default::default()
        },
    )?;
    log::info!(
        "Connected to completion API at {} with {}",
        config.api_url,
        config.model_id
    );

    let generator = QuestionGenerator::new(Arc::new(ChatGptBackend::new(gpt)))
        .with_max_attempts(config.max_attempts)
        .with_shuffled_options(config.shuffle_options);
    let controller = Arc::new(Controller::new(generator));
    let storage: SessionStorage = InMemStorage::<ChatSession>::new().erase();

    let bot = Bot::new(config.bot_token);

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::endpoint(handle_text));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![storage, controller])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn load(storage: SessionStorage, chat_id: ChatId) -> (QuizDialogue, ChatSession) {
    let dialogue = QuizDialogue::new(storage, chat_id);
    let session = ChatSession::restore(dialogue.get().await);
    (dialogue, session)
}

async fn handle_command(
    bot: Bot,
    storage: SessionStorage,
    controller: Arc<Controller>,
    msg: Message,
    cmd: Command,
) -> HandlerResult {
    let (dialogue, session) = load(storage, msg.chat.id).await;

    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, render::GREETING_TEXT).await?;
            send_view(&bot, msg.chat.id, &session).await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
        Command::Quiz => return run_pass(&bot, &controller, dialogue, session, Action::Start).await,
        Command::Reset => return run_pass(&bot, &controller, dialogue, session, Action::Reset).await,
        Command::Score => {
            bot.send_message(msg.chat.id, render::score_panel(&session.state))
                .await?;
        }
        Command::Topics => {
            bot.send_message(
                msg.chat.id,
                format!("Current topic: {}. Pick another one:", session.topic),
            )
            .reply_markup(KeyboardMarkup::new(render::topic_rows()))
            .await?;
        }
    }

    dialogue.update(session).await?;
    Ok(())
}

async fn handle_text(
    bot: Bot,
    storage: SessionStorage,
    controller: Arc<Controller>,
    msg: Message,
) -> HandlerResult {
    let (dialogue, session) = load(storage, msg.chat.id).await;

    match msg.text().and_then(render::parse_action) {
        Some(action) => run_pass(&bot, &controller, dialogue, session, action).await,
        None => {
            bot.send_message(msg.chat.id, "Please use the buttons below, or /help.")
                .await?;
            send_view(&bot, msg.chat.id, &session).await?;
            dialogue.update(session).await?;
            Ok(())
        }
    }
}

/// Runs one controller pass, stores the result and shows the outcome.
async fn run_pass(
    bot: &Bot,
    controller: &Controller,
    dialogue: QuizDialogue,
    mut session: ChatSession,
    action: Action,
) -> HandlerResult {
    let chat_id = dialogue.chat_id();

    if matches!(action, Action::Start | Action::Submit) {
        // Generation takes a few seconds. Nothing breaks if this fails.
        let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;
    }

    let answered_before = session.state.history.len();
    let notices = controller.handle(&mut session, action).await;
    dialogue.update(session.clone()).await?;

    for notice in &notices {
        bot.send_message(chat_id, notice.text()).await?;
    }
    if session.state.history.len() > answered_before {
        bot.send_message(chat_id, render::score_panel(&session.state))
            .await?;
    }

    send_view(bot, chat_id, &session).await
}

async fn send_view(bot: &Bot, chat_id: ChatId, session: &ChatSession) -> HandlerResult {
    let text = match &session.state.active {
        Some(question) => render::question_text(question, session.topic),
        None => render::idle_text(session),
    };

    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(render::keyboard(session))
        .await?;
    Ok(())
}
