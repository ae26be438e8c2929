use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::normalizer;

use super::state::{SessionState, SessionStatus};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

pub(super) const CHECK_INTERVAL_SECS: u64 = 10;

/// Poll-based re-validation while a session is running: each tick re-reads
/// the open interval from the store and applies the midnight split when it
/// has crossed a day boundary. Failures are logged and left for the next
/// tick to re-observe; nothing is retried inline.
pub(super) async fn revalidation_loop(
    user_id: String,
    db: Database,
    state: Arc<Mutex<SessionState>>,
    cancel_token: CancellationToken,
    check_interval: Duration,
) {
    let mut ticker = tokio::time::interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                {
                    let guard = state.lock().await;
                    if guard.status != SessionStatus::Running {
                        break;
                    }
                }

                let running = match db.get_running_log(&user_id).await {
                    Ok(running) => running,
                    Err(err) => {
                        log_error!("re-validation query failed for {}: {err:?}", user_id);
                        continue;
                    }
                };

                let Some(log) = running else {
                    // The open interval was closed or deleted underneath
                    // us; the store wins.
                    log_info!("no open interval left for {}; clearing session state", user_id);
                    state.lock().await.clear();
                    break;
                };

                match normalizer::ensure_current_day(&db, &log, Utc::now()).await {
                    Ok(Some(successor)) => {
                        log_info!(
                            "split interval {} across midnight; successor {}",
                            log.id,
                            successor.id
                        );
                        state.lock().await.begin(&successor);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        log_error!("midnight split failed for {}: {err}", log.id);
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("re-validation loop shutting down");
                break;
            }
        }
    }
}
