//! One-shot subcommands operating on the stored session.

use anyhow::{Context, Result};

use ourschool_core::{
    ApiClient, Config, ExtendOutcome, SessionController, SessionSnapshot, User,
};

pub async fn login(
    controller: &SessionController,
    api: &ApiClient,
    config: &mut Config,
    token: &str,
) -> Result<()> {
    let user = api
        .fetch_current_user(token)
        .await
        .context("Failed to look up the token's user")?;
    if !user.is_active {
        anyhow::bail!("Account {} is inactive", user.username);
    }

    let username = user.username.clone();
    let full_name = user.full_name();
    start_session(controller, token, user)?;

    config.last_username = Some(username.clone());
    if let Err(e) = config.save() {
        tracing::warn!(error = %e, "Failed to save config");
    }

    println!(
        "Logged in as {} ({}), {} remaining",
        full_name,
        username,
        controller.snapshot().time_remaining_display()
    );
    Ok(())
}

/// Persist the session, keeping the stored credentials but no running tasks.
/// Fails when the token ended the session straight away.
fn start_session(controller: &SessionController, token: &str, user: User) -> Result<()> {
    let username = user.username.clone();
    controller.login(token, user)?;
    controller.shutdown();
    if !controller.is_authenticated() {
        anyhow::bail!("Token for {} has already expired; request a new one", username);
    }
    Ok(())
}

pub fn status(controller: &SessionController) -> Result<()> {
    controller.restore();
    controller.shutdown();
    println!("{}", describe(&controller.snapshot()));
    Ok(())
}

pub fn logout(controller: &SessionController) -> Result<()> {
    controller.logout(None);
    println!("Logged out");
    Ok(())
}

pub async fn extend(controller: &SessionController) -> Result<()> {
    if !controller.restore() {
        anyhow::bail!("No active session to extend");
    }

    let outcome = controller.extend_session().await;
    controller.shutdown();
    match outcome {
        ExtendOutcome::Renewed => {
            println!(
                "Session extended, {} remaining",
                controller.snapshot().time_remaining_display()
            );
            Ok(())
        }
        ExtendOutcome::SessionEnded | ExtendOutcome::Superseded => {
            anyhow::bail!("Session could not be extended; please log in again")
        }
    }
}

/// One-line session summary
fn describe(snapshot: &SessionSnapshot) -> String {
    match &snapshot.user {
        Some(user) if snapshot.is_valid => {
            let warning = if snapshot.show_warning {
                " (expiring soon)"
            } else {
                ""
            };
            format!(
                "Logged in as {} ({}), {} remaining{}",
                user.full_name(),
                user.username,
                snapshot.time_remaining_display(),
                warning
            )
        }
        _ => "Not logged in".to_string(),
    }
}
