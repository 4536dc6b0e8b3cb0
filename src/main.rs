use anyhow::Result;
use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caption_corrector::cli::{Cli, Commands, OutputFormat};
use caption_corrector::config::Config;
use caption_corrector::transcribe::{video_id_from_url, CorrectionPipeline};
use caption_corrector::{output, utils};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "caption_corrector=debug"
    } else {
        "caption_corrector=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // API keys usually live in a local .env file
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Failed to load .env file: {}", e),
    }

    let mut config = Config::load().await?;

    match cli.command {
        Commands::Correct {
            url,
            languages,
            max_words,
            model,
            format,
            output,
            no_clipboard,
        } => {
            if let Some(languages) = languages {
                config.captions.languages = languages;
            }
            if let Some(max_words) = max_words {
                config.app.max_words = max_words as usize;
            }
            if let Some(model) = model {
                config.completion.model = model;
            }
            config.validate()?;

            let video_id = video_id_from_url(&url)?;
            println!("Video ID: {}", video_id);

            // Check for required external dependencies (non-fatal)
            let missing_deps = utils::check_dependencies(&config.captions.yt_dlp_path).await;
            if !missing_deps.is_empty() {
                eprintln!("{}  Dependency check warnings:", style("⚠").yellow());
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
                eprintln!("   (Continuing anyway - tools may be available)");
            }

            let pipeline = CorrectionPipeline::from_config(&config)?.with_progress(!cli.quiet);
            let report = pipeline.correct_video(video_id).await?;

            if report.failed_chunks() > 0 {
                eprintln!(
                    "{}  {} of {} chunks could not be corrected and were left empty",
                    style("⚠").yellow(),
                    report.failed_chunks(),
                    report.chunks.len()
                );
            }

            if matches!(format, OutputFormat::Text) {
                println!("\n{}\n", style("Corrected transcript:").bold());
            }
            output::print_to_console(&report, &format)?;

            if let Some(path) = output {
                output::save_to_file(&report, &path, &format).await?;
                println!("Output saved to: {}", path.display());
            }

            if config.app.copy_to_clipboard && !no_clipboard {
                match output::copy_to_clipboard(&report.corrected_text) {
                    Ok(()) => println!("\n{} {}", style("✓").green(), output::CLIPBOARD_NOTICE),
                    Err(e) => println!("\n{}  {}", style("⚠").yellow(), e),
                }
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("{}", config.setup_instructions()?);
            }
        }
    }

    Ok(())
}
