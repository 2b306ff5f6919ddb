//! CLI handlers that talk to a running visit through its control API.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::cli::args::ControlCliArgs;
use crate::config::Config;

fn base_url(args: &ControlCliArgs) -> Result<String> {
    let port = match args.port {
        Some(port) => port,
        None => Config::load()?.api.port,
    };
    Ok(format!("http://127.0.0.1:{}", port))
}

fn error_message(json: &Value) -> &str {
    json.get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
}

pub async fn show_status(args: ControlCliArgs) -> Result<()> {
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/visit/status", base_url(&args)?))
        .send()
        .await
        .context("Failed to connect to televisit. Is a visit running?")?;

    let json: Value = response.json().await?;

    let state = json
        .get("state")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let active = json.get("active").and_then(|v| v.as_bool()).unwrap_or(false);

    if active {
        let duration = json
            .get("duration_seconds")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let role = json.get("role").and_then(|v| v.as_str()).unwrap_or("unknown");
        let muted = json
            .get("microphone_muted")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let video = json
            .get("video_enabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        println!(
            "Visit {} ({} as {})",
            json.get("meeting_id").and_then(|v| v.as_str()).unwrap_or(""),
            state,
            role
        );
        println!("Duration: {:02}:{:02}", duration / 60, duration % 60);
        println!(
            "Microphone: {} | Camera: {}",
            if muted { "muted" } else { "on" },
            if video { "on" } else { "off" }
        );
    } else {
        println!("No live visit (state: {})", state);
    }

    if let Some(err) = json.get("last_error").and_then(|v| v.as_str()) {
        println!("Last error: {}", err);
    }
    if let Some(warning) = json.get("last_warning").and_then(|v| v.as_str()) {
        println!("Warning: {}", warning);
    }

    Ok(())
}

pub async fn toggle_microphone(args: ControlCliArgs) -> Result<()> {
    let json = post(&args, "microphone").await?;
    match json.get("microphone_muted").and_then(|v| v.as_bool()) {
        Some(true) => println!("Microphone muted"),
        Some(false) => println!("Microphone on"),
        None => println!("No live visit; nothing to toggle"),
    }
    Ok(())
}

pub async fn toggle_video(args: ControlCliArgs) -> Result<()> {
    let json = post(&args, "video").await?;
    match json.get("video_enabled").and_then(|v| v.as_bool()) {
        Some(true) => println!("Camera on"),
        Some(false) => println!("Camera off"),
        None => println!("No live visit; nothing to toggle"),
    }
    Ok(())
}

pub async fn end_visit(args: ControlCliArgs) -> Result<()> {
    let json = post(&args, "end").await?;

    println!(
        "Visit ended (meeting: {})",
        json.get("meeting_id").and_then(|v| v.as_str()).unwrap_or("")
    );
    if let Some(warning) = json.get("notify_warning").and_then(|v| v.as_str()) {
        println!("Warning: {}", warning);
    }

    Ok(())
}

async fn post(args: &ControlCliArgs, action: &str) -> Result<Value> {
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/visit/{}", base_url(args)?, action))
        .send()
        .await
        .context("Failed to connect to televisit. Is a visit running?")?;

    let status = response.status();
    let json: Value = response.json().await?;

    if !status.is_success() {
        bail!("Failed to {} visit: {}", action, error_message(&json));
    }

    Ok(json)
}
