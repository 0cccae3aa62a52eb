use std::time::Duration;

use env_flags::env_flags;

env_flags! {
    /// Upper bound for `ResponsesClient::send_with_retry`.
    pub RESPONSES_REQUEST_MAX_RETRIES: u64 = 4;

    pub RESPONSES_REQUEST_TIMEOUT_MS: Duration = Duration::from_millis(300_000), |value| {
        value.parse().map(Duration::from_millis)
    };
}
