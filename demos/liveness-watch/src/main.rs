//! Watches one session against a real backend.
//!
//! ```text
//! VIGIL_BASE_URL=https://app.example.com \
//!     liveness-watch 'https://app.example.com/chat?tokenInfo=...'
//! ```
//!
//! Routes the given page URL (capturing a token if it carries one), runs
//! the auto-login flow, then prints every liveness change until the
//! session is logged out or Ctrl-C is pressed.

use std::sync::Arc;

use clap::Parser;
use url::Url;
use vigil::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "liveness-watch")]
#[command(about = "Log in with a delivered token and watch the session stay alive")]
struct Cli {
    /// Page URL as opened by the user, optionally carrying `?tokenInfo=`.
    /// Defaults to `/chat` on the configured backend.
    page_url: Option<Url>,
}

#[tokio::main]
async fn main() -> Result<(), VigilError> {
    let cli = Cli::parse();
    vigil::init_tracing();
    let config = VigilConfig::from_env()?;

    let page_url = cli.page_url.unwrap_or_else(|| {
        let mut url = config.base_url.clone();
        url.set_path("/chat");
        url
    });

    // What a browser would hold after following the link.
    let (path, cookie_header) = match vigil::session::route(&page_url, &config.routing) {
        RouteDecision::CaptureToken { cookie, location } => {
            tracing::info!(set_cookie = %redact(&cookie.to_string()), "token captured");
            (location.path().to_string(), Some(cookie.pair()))
        }
        RouteDecision::Rewrite(target) => {
            tracing::info!(to = target.path(), "enterprise rewrite");
            (target.path().to_string(), None)
        }
        RouteDecision::PassThrough => (page_url.path().to_string(), None),
    };

    let cookies = match cookie_header {
        Some(header) => StaticCookies::new(header),
        None => StaticCookies::empty(),
    };
    let navigator = Arc::new(MemoryNavigator::at(path));
    let page = Vigil::connect(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(cookies),
        Arc::clone(&navigator),
    )?;

    match page.auto_login().await? {
        LoginOutcome::LoggedIn => tracing::info!("logged in"),
        outcome => {
            tracing::warn!(?outcome, "no session established");
            return Ok(());
        }
    }

    let supervisor = page.supervise();
    let mut updates = supervisor.subscribe();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                println!(
                    "verdict={} banner={} expires_in={:?}",
                    snapshot.verdict,
                    snapshot.show_banner(),
                    snapshot.seconds_until_expiration,
                );
                if snapshot.verdict.is_logged_out() {
                    println!("redirected to {}", navigator.current_path());
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    supervisor.shutdown().await;
    Ok(())
}

/// Keeps the cookie attributes, hides the value.
fn redact(set_cookie: &str) -> String {
    match set_cookie.split_once(';') {
        Some((pair, attrs)) => {
            let name = pair.split('=').next().unwrap_or_default();
            format!("{name}=<redacted>;{attrs}")
        }
        None => "<redacted>".to_string(),
    }
}
