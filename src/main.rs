use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use food_recommendation::analysis::top_restaurants;
use food_recommendation::bot::{message_handler, BotContext};
use food_recommendation::config::{AppConfig, LogFormat};
use food_recommendation::history::OrderStore;
use food_recommendation::localization::init_localization;
use food_recommendation::pipeline::{refresh_orders, reparse_orders, LogObserver};
use food_recommendation::recommend::{
    ClaudeRecommender, RecommendationGenerator, TemplateRecommender,
};

#[derive(Parser)]
#[command(name = "food-recommendation", version, about = "TGO Yemek order history and food recommendations")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Telegram bot (default)
    Bot,
    /// Log in, fetch orders and rewrite the JSON and CSV artifacts
    Fetch,
    /// Rebuild the CSV summary from the saved JSON document
    Parse,
    /// Print a template recommendation
    Recommend {
        /// Fix the random seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print a recommendation from the Anthropic API
    AiRecommend,
    /// Print the most ordered restaurants
    TopRestaurants {
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = AppConfig::from_env();
    init_tracing(config.log_format);

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Bot) {
        Command::Bot => run_bot(config).await,
        Command::Fetch => run_fetch(config).await,
        Command::Parse => run_parse(config),
        Command::Recommend { seed } => run_recommend(config, seed).await,
        Command::AiRecommend => run_ai_recommend(config).await,
        Command::TopRestaurants { limit } => run_top_restaurants(config, limit),
    }
}

async fn run_bot(config: AppConfig) -> Result<()> {
    let token = config.require_telegram_token()?.to_string();
    init_localization()?;

    info!("Starting food recommendation bot");

    let ctx = Arc::new(BotContext::from_config(config));
    let bot = Bot::new(token);

    let handler = dptree::entry().branch(Update::filter_message().endpoint(
        |bot: Bot, msg: Message, ctx: Arc<BotContext>| async move {
            let chat_id = msg.chat.id;
            if let Err(e) = message_handler(bot, msg, ctx).await {
                error!(chat_id = %chat_id, error = ?e, "Message handler failed");
            }
            Ok::<(), anyhow::Error>(())
        },
    ));

    info!("Bot initialized, starting dispatcher");

    // A single distribution key keeps updates strictly sequential
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .distribution_function(|_| Some(()))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn run_fetch(config: AppConfig) -> Result<()> {
    let store = OrderStore::new(config.data_dir.clone());
    let report = refresh_orders(&config, &store, &LogObserver).await?;

    println!(
        "Saved {} orders to {} and {}",
        report.records.len(),
        report.json_path.display(),
        report.csv_path.display()
    );
    Ok(())
}

fn run_parse(config: AppConfig) -> Result<()> {
    let store = OrderStore::new(config.data_dir);
    let report = reparse_orders(&store)?;

    println!(
        "Wrote {} records to {}",
        report.records.len(),
        report.csv_path.display()
    );
    Ok(())
}

async fn run_recommend(config: AppConfig, seed: Option<u64>) -> Result<()> {
    let recommender = match seed {
        Some(seed) => TemplateRecommender::seeded(seed),
        None => TemplateRecommender::new(),
    };
    generate_and_print(&config, &recommender).await
}

async fn run_ai_recommend(config: AppConfig) -> Result<()> {
    let recommender = ClaudeRecommender::from_config(&config)?;
    generate_and_print(&config, &recommender).await
}

async fn generate_and_print(config: &AppConfig, generator: &dyn RecommendationGenerator) -> Result<()> {
    let store = OrderStore::new(config.data_dir.clone());
    let records = store.read_records()?;

    let text = generator.generate(&records).await?;
    let path = store.save_recommendation(generator.artifact_name(), &text)?;

    println!("{text}");
    info!(strategy = generator.name(), path = %path.display(), "Recommendation saved");
    Ok(())
}

fn run_top_restaurants(config: AppConfig, limit: usize) -> Result<()> {
    let store = OrderStore::new(config.data_dir);
    let records = store.read_records()?;

    let ranking = top_restaurants(&records, limit);
    if ranking.is_empty() {
        println!("No orders found.");
        return Ok(());
    }

    for (i, (restaurant, count)) in ranking.iter().enumerate() {
        println!("{}. {restaurant}: {count} orders", i + 1);
    }
    Ok(())
}
