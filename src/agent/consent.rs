use std::sync::Arc;

use rand::{thread_rng, Rng};
use tokio::time::{sleep, Duration};

use crate::candidate::CandidatePair;

use super::ConnectionInternal;

/// Nominal interval between consent checks (RFC 7675 section 5.1).
pub const CONSENT_INTERVAL: Duration = Duration::from_secs(5);
/// Consecutive failures after which consent is considered expired.
pub const CONSENT_FAILURES: u32 = 6;

impl ConnectionInternal {
    /// Periodically re-verifies consent on every nominated pair with an
    /// authenticated, non-retransmitted binding request (RFC 7675). Closes
    /// the connection once the failure threshold is reached.
    pub(crate) async fn query_consent(self: Arc<Self>) {
        let mut failures: u32 = 0;
        loop {
            // randomize between 0.8 and 1.2 times the interval
            let jitter = thread_rng().gen_range(0.8..1.2);
            sleep(CONSENT_INTERVAL.mul_f64(jitter)).await;

            let pairs: Vec<Arc<CandidatePair>> = {
                let state = self.state.lock().await;
                state.nominated.values().cloned().collect()
            };

            for pair in pairs {
                let (request, remote_password) = {
                    let state = self.state.lock().await;
                    let request = match self.build_request(&state, &pair, false) {
                        Ok(request) => request,
                        Err(_) => continue,
                    };
                    match state.remote_password.clone() {
                        Some(password) => (request, password),
                        None => continue,
                    }
                };

                match pair
                    .endpoint
                    .request(request, pair.remote_addr(), Some(&remote_password), Some(0))
                    .await
                {
                    Ok(_) => failures = 0,
                    Err(_) => failures += 1,
                }

                if failures >= CONSENT_FAILURES {
                    log::info!("[{}]: consent to send expired", self.name);
                    // clear our own handle so close() does not wait on us
                    self.state.lock().await.consent_task = None;
                    let _ = self.close().await;
                    return;
                }
            }
        }
    }
}
