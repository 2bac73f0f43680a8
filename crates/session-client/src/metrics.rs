//! Protocol counters
//!
//! Emitted through the `metrics` facade. Without an installed recorder these
//! calls are no-ops, so library users opt in by installing an exporter.
//!
//! - `session_requests_total` (counter): label `outcome`
//! - `session_token_refresh_total` (counter): label `result`
//! - `session_anonymous_id_updates_total` (counter)

/// Record the final outcome of one executor call.
pub fn record_request(outcome: &'static str) {
    metrics::counter!("session_requests_total", "outcome" => outcome).increment(1);
}

/// Record one underlying refresh operation (`success` / `failure` / `skipped`).
pub fn record_refresh(result: &'static str) {
    metrics::counter!("session_token_refresh_total", "result" => result).increment(1);
}

pub fn record_anonymous_id_update() {
    metrics::counter!("session_anonymous_id_updates_total").increment(1);
}
