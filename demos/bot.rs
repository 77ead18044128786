use burz_gateway::{ws::Event, Bot, DeliverError};

async fn print_event(event: Event) -> Result<(), DeliverError> {
    log::info!("Received event: {}", event);
    Ok(())
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let token = match std::env::var("BOT_TOKEN") {
        Ok(token) => token,
        Err(_) => {
            println!("No BOT_TOKEN env var or invalid");
            std::process::exit(1);
        }
    };

    let bot = match Bot::new(&token) {
        Ok(bot) => bot,
        Err(err) => {
            println!("Create bot failed: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = bot.run(print_event).await {
        println!("Bot stopped: {}", err);
        std::process::exit(1);
    }
}
