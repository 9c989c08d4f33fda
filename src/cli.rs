//! Command implementations for the `roomcraft` binary

use crate::capture::{DeviceAccessError, StillFileCamera};
use crate::config::Config;
use crate::gateway::{Gateway, HttpGateway, Rgb};
use crate::session::{
    fetch_quote, AvatarChat, Mode, PhaseKind, Session, SessionError, SessionSnapshot, Style,
};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{settings::Style as TableStyle, Table, Tabled};

/// Options shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub base_url: Option<String>,
    pub json: bool,
}

/// Follow-up steps after an image is on screen
#[derive(Debug, Clone, Default)]
pub struct FollowUps {
    pub segment: bool,
    pub recolor: Option<(usize, Rgb)>,
    pub narrate: bool,
    pub reconstruct: bool,
}

/// Resolve the effective configuration: file, then environment, then flags
pub fn load_config(opts: &GlobalOptions) -> Result<Config> {
    let mut config = match &opts.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env()?;
    if let Some(url) = &opts.base_url {
        config.gateway.base_url = url.clone();
    }
    Ok(config)
}

fn session_for(config: &Config) -> Result<Session<HttpGateway>> {
    let gateway = HttpGateway::new(&config.gateway)?;
    tracing::info!("Using backend at {}", gateway.base_url());
    Ok(Session::new(Arc::new(gateway), &config.session))
}

/// List the style catalogue
pub fn run_styles(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&Style::ALL)?);
    } else {
        for style in Style::ALL {
            println!("  {}", style.as_str().green());
        }
    }
    Ok(())
}

/// Generate a room and run the requested follow-ups
///
/// Returns `false` when the session ends in a failure.
pub async fn run_generate(
    config: &Config,
    json: bool,
    style: Option<Style>,
    follow_ups: FollowUps,
) -> Result<bool> {
    let session = session_for(config)?;
    if let Some(style) = style {
        session.select_style(style);
    }
    if !json {
        println!("{} {} room...", "Generating".bold(), session.style().as_str().cyan());
    }

    let ok = step(session.start_generate().await).is_some()
        && run_follow_ups(&session, &follow_ups).await?;
    finish(&session, json, ok)
}

/// Restyle a photo read from `photo`
pub async fn run_redesign(
    config: &Config,
    json: bool,
    photo: &Path,
    style: Option<Style>,
    follow_ups: FollowUps,
) -> Result<bool> {
    let session = session_for(config)?.with_device(Arc::new(StillFileCamera::new(photo)));
    session.switch_mode(Mode::Redesign);
    if let Some(style) = style {
        session.select_style(style);
    }
    if !json {
        println!(
            "{} {} in {} style...",
            "Redesigning".bold(),
            photo.display(),
            session.style().as_str().cyan()
        );
    }

    let ok = step(session.start_camera_capture()).is_some()
        && step(session.take_picture()).is_some()
        && step(session.submit_redesign().await).is_some()
        && run_follow_ups(&session, &follow_ups).await?;
    finish(&session, json, ok)
}

async fn run_follow_ups(session: &Session<HttpGateway>, follow_ups: &FollowUps) -> Result<bool> {
    if follow_ups.segment || follow_ups.recolor.is_some() {
        if step(session.request_segmentation().await).is_none() {
            return Ok(false);
        }
    }

    if let Some((index, color)) = follow_ups.recolor {
        let segments = session.snapshot().segments.unwrap_or_default();
        let mask = segments.get(index).cloned().with_context(|| {
            format!(
                "No segment at index {} ({} segments found)",
                index,
                segments.len()
            )
        })?;
        if step(session.recolor_object(mask, color).await).is_none() {
            return Ok(false);
        }
    }

    if follow_ups.narrate && step(session.request_narration().await).is_none() {
        return Ok(false);
    }

    if follow_ups.reconstruct && step(session.request_reconstruction().await).is_none() {
        return Ok(false);
    }

    Ok(true)
}

/// Stop on a failed step. Call failures are already recorded on the
/// session; refusals that left it untouched are printed here.
fn step<T>(result: std::result::Result<T, SessionError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            if e.is_rejection() || e == SessionError::Device(DeviceAccessError::NotReady) {
                eprintln!("{} {}", "✗".red(), e);
            } else {
                tracing::debug!("Step failed: {}", e);
            }
            None
        }
    }
}

fn finish(session: &Session<HttpGateway>, json: bool, ok: bool) -> Result<bool> {
    let snapshot = session.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(ok && snapshot.phase != PhaseKind::Failed && snapshot.error.is_none())
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    println!();
    println!(
        "{} {} ({})",
        "Phase:".bold(),
        snapshot.phase.as_str().cyan(),
        snapshot.phase.description()
    );
    println!("{} {}", "Style:".bold(), snapshot.style);

    if let Some(image) = &snapshot.image {
        println!("{} {}", "Image:".bold(), image);
    }
    if let Some(segments) = &snapshot.segments {
        println!("{}", "Segments:".bold());
        if segments.is_empty() {
            println!("  (no objects found)");
        }
        for (i, segment) in segments.iter().enumerate() {
            let label = if segment.label.is_empty() {
                "(unlabelled)"
            } else {
                segment.label.as_str()
            };
            println!("  [{}] {}", i, label);
        }
    }
    if let Some(model) = &snapshot.model {
        println!("{} {}", "Model:".bold(), model.url);
        if let Some(used) = &model.model_used {
            println!("  via {}", used);
        }
    }
    if let Some(audio) = &snapshot.audio {
        println!("{} {}", "Narration:".bold(), audio);
    }
    if let Some(quote) = &snapshot.quote {
        println!("\n  \"{}\"", quote.italic());
    }
    if let Some(error) = &snapshot.error {
        eprintln!("\n{} {}", "Error:".red().bold(), error.message);
        if let Some(detail) = &error.detail {
            eprintln!("  {}", detail.dimmed());
        }
    }
}

/// Print a designer quote
pub async fn run_quote(config: &Config, json: bool) -> Result<()> {
    let gateway = HttpGateway::new(&config.gateway)?;
    let quote = fetch_quote(&gateway).await;
    if json {
        println!("{}", serde_json::json!({ "quote": quote }));
    } else {
        println!("\"{}\"", quote);
    }
    Ok(())
}

/// Send one message to the designer avatar
pub async fn run_chat(
    config: &Config,
    json: bool,
    message: &str,
    character: Option<String>,
    style: Option<Style>,
) -> Result<()> {
    let gateway = HttpGateway::new(&config.gateway)?;
    let mut chat_config = config.chat.clone();
    if let Some(name) = character {
        chat_config.character_name = name;
    }
    let style = style
        .or(config.session.default_style)
        .unwrap_or_else(Style::random);

    let mut chat = AvatarChat::new(&chat_config);
    let reply = chat.send(&gateway, message, style).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else {
        println!("{} {}", format!("{}:", chat.character_name()).bold().cyan(), reply.text);
    }
    Ok(())
}

/// Check backend health and reconstruction model availability
pub async fn run_health(config: &Config, json: bool) -> Result<bool> {
    let gateway = HttpGateway::new(&config.gateway)?;
    let (health, models) = futures::join!(gateway.health(), gateway.available_models());

    if json {
        let output = serde_json::json!({
            "base_url": gateway.base_url().as_str(),
            "health": health.as_ref().ok(),
            "health_error": health.as_ref().err().map(|e| e.to_string()),
            "available_models": models.as_ref().ok(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(health.map(|h| h.is_healthy()).unwrap_or(false));
    }

    println!("{} {}", "Backend:".bold(), gateway.base_url());
    let healthy = match &health {
        Ok(status) if status.is_healthy() => {
            println!("{} {}", "✓".green(), status.status);
            true
        }
        Ok(status) => {
            println!("{} {}", "✗".red(), status.status);
            false
        }
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            false
        }
    };
    if let Ok(status) = &health {
        if !status.fal_api_configured {
            println!("  {}", "Image API key is not configured on the backend".yellow());
        }
    }

    match models {
        Ok(models) if !models.available_models.is_empty() => {
            #[derive(Tabled)]
            struct ModelRow {
                #[tabled(rename = "Model")]
                model: String,
                #[tabled(rename = "Status")]
                status: String,
                #[tabled(rename = "Error")]
                error: String,
            }

            let rows: Vec<ModelRow> = models
                .available_models
                .into_iter()
                .map(|m| ModelRow {
                    model: m.model,
                    status: m.status,
                    error: m.error.unwrap_or_default(),
                })
                .collect();
            println!();
            let mut table = Table::new(rows);
            table.with(TableStyle::rounded());
            println!("{}", table);
            if let Some(demo) = models.demo_glb_url {
                println!("{} {}", "Demo model:".bold(), demo);
            }
        }
        Ok(_) => println!("No 3D models reported"),
        Err(e) => println!("{} {}", "Models unavailable:".yellow(), e),
    }

    Ok(healthy)
}

/// Print the effective configuration
pub fn run_config(config: &Config, path: Option<&Path>, json: bool) -> Result<()> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => Config::config_path()?,
    };
    if json {
        let output = serde_json::json!({
            "path": path.display().to_string(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("# {}", path.display());
        print!("{}", config.to_toml()?);
    }
    Ok(())
}
