//! Text shown to the operator for a store snapshot.

use wolvadmin::{AuthPhase, AuthSnapshot, ProfileSource, UserProfile};

pub const NOT_SIGNED_IN: &str = "Not signed in.";
pub const VERIFY_EMAIL: &str = "Check your email for verification link!";
pub const SIGNED_OUT: &str = "Signed out.";

/// Welcome block for a signed-in profile.
#[must_use]
pub fn welcome(profile: &UserProfile) -> String {
    let mut lines = vec!["Welcome!".to_owned()];
    lines.push(format!("Email: {}", profile.email.as_deref().unwrap_or("")));
    match (&profile.source, &profile.role) {
        (ProfileSource::Degraded { reason }, _) => lines.push(format!("Role: unavailable ({reason})")),
        (ProfileSource::Fetched, Some(role)) => lines.push(format!("Role: {role}")),
        (ProfileSource::Fetched, None) => {}
    }
    lines.join("\n")
}

/// Summary of a settled snapshot.
#[must_use]
pub fn status(snapshot: &AuthSnapshot) -> String {
    match &snapshot.user {
        Some(profile) if snapshot.session.is_some() => welcome(profile),
        _ => NOT_SIGNED_IN.to_owned(),
    }
}

/// One line per phase change for `watch`.
#[must_use]
pub fn phase_line(snapshot: &AuthSnapshot) -> String {
    let phase = match snapshot.phase() {
        AuthPhase::Unauthenticated => "unauthenticated",
        AuthPhase::Authenticating => "authenticating",
        AuthPhase::Authenticated => "authenticated",
    };
    let email = snapshot
        .session
        .as_ref()
        .and_then(|s| s.user.email.as_deref())
        .map(|email| format!(" {email}"))
        .unwrap_or_default();
    let role = snapshot
        .user
        .as_ref()
        .and_then(|u| u.role.as_deref())
        .map(|role| format!(" role={role}"))
        .unwrap_or_default();
    format!("{phase}{email}{role}")
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
