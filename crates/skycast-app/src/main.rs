use std::sync::Arc;

use anyhow::Result;
use skycast_app::{App, RequestState};
use skycast_core::{Config, LogEmitter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core (tracing subscriber)
    skycast_core::init()?;

    let (config, _validation) = Config::load_validated()?;
    let mut app = App::from_config(&config, Arc::new(LogEmitter))?;

    tracing::info!("Skycast application started");

    println!("Skycast - Gesture-Navigable Weather");
    println!("Configuration directory: {}", config.config_dir.display());
    println!("Theme: {}", app.theme.current().as_str());

    // Resolve the device location if the platform supports it; the
    // rendering shell drives search/selection interactively otherwise.
    match app.locate_and_select().await {
        Ok(place) => {
            println!("Location: {}", place.display_name);
            app.orchestrator.wait_settled().await;
            match app.orchestrator.state() {
                RequestState::Success { bundle } => println!(
                    "Currently {:.1}° ({})",
                    bundle.current.temperature,
                    bundle.current.condition.description()
                ),
                RequestState::Failed { kind, .. } => {
                    println!("Weather unavailable: {}", kind.user_message())
                }
                _ => {}
            }
        }
        Err(e) => println!("Location unavailable: {}", e.user_message()),
    }

    Ok(())
}
