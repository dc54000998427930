use std::io::{self, BufRead, Write};
use std::sync::Arc;

use reality_glitch::{
    AppError, OpenAiService, SaveManager, Settings, SignalAggregator, StorySegment, StorySession,
    logging,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load().unwrap_or_default();
    logging::init(settings.debug_mode)?;

    let api_key = settings
        .openai_api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .ok_or("No OpenAI API key: set it in ./data/settings.json or OPENAI_API_KEY")?;

    let service = Arc::new(OpenAiService::new(&api_key, &settings.model));
    let aggregator = SignalAggregator::new(settings.signal_providers());
    let profile = aggregator.get_profile().await;

    println!("reality intensity: {}\n", profile.intensity);
    let mut session =
        StorySession::new_session(service, SaveManager::new(), Some(&profile)).await?;

    print_segment(session.segment());
    repl(&mut session).await
}

fn print_segment(segment: &StorySegment) {
    println!("\n{}\n", segment.narrative);
    for (i, choice) in segment.choices.iter().enumerate() {
        println!("{}. {}", i + 1, choice);
    }
    println!("\n[1-3] choose | save [title] | saves | load <id> | quit");
}

async fn repl(session: &mut StorySession) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();

        match line {
            "quit" | "exit" => {
                println!("The aliens make a disappointed kazoo noise as you exit the simulation...");
                return Ok(());
            }
            "saves" => {
                for summary in session.list_saves() {
                    println!(
                        "{}  {}  [{}]  {}",
                        summary.id,
                        summary.updated_at.format("%Y-%m-%d %H:%M"),
                        summary.title,
                        summary.narrative_preview
                    );
                }
            }
            "" => {}
            _ if line.starts_with("save") => {
                let title = line
                    .strip_prefix("save")
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from);
                match session.save(None, title) {
                    Ok(id) => println!("Saved as {id}"),
                    Err(e) => println!("This save failed: {e}"),
                }
            }
            _ if line.starts_with("load ") => {
                let raw = line.trim_start_matches("load ").trim();
                let result = SaveManager::parse_id(raw)
                    .map_err(AppError::from)
                    .and_then(|id| session.load(id).map(|s| s.clone()));
                match result {
                    Ok(segment) => print_segment(&segment),
                    Err(e) => println!("This load failed, your current story is intact: {e}"),
                }
            }
            _ => match line.parse::<usize>() {
                Ok(n) if (1..=3).contains(&n) => {
                    println!("\nYou chose: {}", session.segment().choices[n - 1]);
                    println!("Generating cosmic response...");
                    match session.submit_choice(n - 1).await {
                        Ok(segment) => {
                            let segment = segment.clone();
                            print_segment(&segment);
                        }
                        Err(e) => println!("The universe glitches... ({e})"),
                    }
                }
                _ => println!(
                    "The alien device buzzes angrily - even cosmic horrors appreciate valid inputs."
                ),
            },
        }
    }
}
