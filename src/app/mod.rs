use crate::api::ApiServer;
use crate::auth::{AuthHandle, BearerCredential, TOKEN_ENV};
use crate::cli::VisitCliArgs;
use crate::config::Config;
use crate::gateway::{HttpCredentialGateway, Role};
use crate::media::{LoopbackEngine, MediaEngine, RenderTarget, RenderTargets};
use crate::visit::{MeetingEndedHook, ShellCommandHook, VisitOrchestrator};
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run one visit in this process until it is ended or the host is interrupted.
pub async fn run_visit(args: VisitCliArgs) -> Result<()> {
    info!("Starting televisit host");

    let config = Config::load()?;

    let token = args.token.or_else(|| std::env::var(TOKEN_ENV).ok());
    if token.is_none() {
        warn!("No bearer token given (--token or {}); gateway calls will be refused", TOKEN_ENV);
    }
    let auth = AuthHandle::new(token.map(BearerCredential::new));

    let gateway = Arc::new(HttpCredentialGateway::new(
        &config.gateway.base_url,
        config.request_timeout(),
    )?);
    let engine: Arc<dyn MediaEngine> = Arc::new(LoopbackEngine);
    info!("Using {} media engine", engine.name());

    let orchestrator = Arc::new(VisitOrchestrator::new(
        gateway,
        engine,
        auth,
        build_hook(&config),
        config.visit_options(),
    ));

    let api_server = ApiServer::new(orchestrator.clone(), &config);
    tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("Control API failed: {}", e);
        }
    });

    let descriptor = orchestrator
        .create_meeting(&args.appointment)
        .await
        .context("Failed to create meeting")?;

    let targets = RenderTargets {
        local: args.local_target.map(RenderTarget::new),
        remote: args.remote_target.map(RenderTarget::new),
    };
    let meeting_id = descriptor.meeting_id;

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    if !join_or_leave(&orchestrator, &meeting_id, args.role, targets, interrupt).await? {
        return Ok(());
    }

    info!("Visit is live. Press Ctrl-C to leave.");
    info!("Or from another shell: televisit end");

    let mut states = orchestrator.subscribe();
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Leaving visit");
            leave(&orchestrator, &meeting_id).await;
        }
        state = states.wait_for(|state| state.is_terminal()) => {
            match state {
                Ok(state) => info!("Visit finished: {}", *state),
                Err(e) => warn!("Lost visit state updates: {}", e),
            }
        }
    }

    orchestrator.dispose();
    Ok(())
}

/// Join the created meeting unless `interrupt` completes first.
///
/// Returns `Ok(false)` when interrupted. On interruption or a join error the
/// meeting is ended on the gateway and the visit disposed before returning.
pub async fn join_or_leave(
    orchestrator: &VisitOrchestrator,
    meeting_id: &str,
    role: Role,
    targets: RenderTargets,
    interrupt: impl Future<Output = ()>,
) -> Result<bool> {
    // Dropping the join on interrupt puts the visit back to Created.
    let joined = tokio::select! {
        result = orchestrator.join_meeting(meeting_id, role, targets) => Some(result),
        _ = interrupt => None,
    };

    match joined {
        Some(Ok(())) => Ok(true),
        Some(Err(e)) => {
            leave(orchestrator, meeting_id).await;
            orchestrator.dispose();
            Err(e).context("Failed to join meeting")
        }
        None => {
            info!("Interrupted while joining");
            leave(orchestrator, meeting_id).await;
            orchestrator.dispose();
            Ok(false)
        }
    }
}

/// End the meeting on the gateway, logging instead of failing.
async fn leave(orchestrator: &VisitOrchestrator, meeting_id: &str) {
    match orchestrator.end_meeting(meeting_id).await {
        Ok(outcome) => {
            if let Some(warning) = outcome.notify_warning {
                warn!("{}", warning);
            }
        }
        Err(e) => warn!("Could not end meeting {}: {}", meeting_id, e),
    }
}

fn build_hook(config: &Config) -> Option<Arc<dyn MeetingEndedHook>> {
    let command = config.hook.on_meeting_ended.trim();
    if command.is_empty() {
        return None;
    }
    info!("Meeting-ended hook configured: {}", command);
    Some(Arc::new(ShellCommandHook::new(
        command.to_string(),
        config.hook.timeout_seconds,
    )))
}
