//! Link freshness derived from the last command arrival.

use embassy_time::{Duration, Instant};

/// Whether the remote is still talking to us.
///
/// Before the first packet the link counts as alive, so the rover does not
/// fail-safe while the remote is still starting up. An arrival stamped later
/// than `now` (the receive context ran after `now` was read) is zero elapsed
/// time.
pub fn is_alive(
    now: Instant,
    last_packet: Option<Instant>,
    timeout: Duration,
) -> bool {
    match last_packet {
        None => true,
        Some(last) => now.checked_duration_since(last).unwrap_or(Duration::from_ticks(0)) < timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(500);

    #[test]
    fn alive_before_first_packet() {
        assert!(is_alive(Instant::from_millis(1_000_000), None, TIMEOUT));
    }

    #[test]
    fn stale_after_timeout() {
        assert!(!is_alive(Instant::from_millis(1000), Some(Instant::from_millis(0)), TIMEOUT));
    }

    #[test]
    fn boundary_is_exclusive() {
        let last = Some(Instant::from_millis(100));
        assert!(is_alive(Instant::from_millis(599), last, TIMEOUT));
        assert!(!is_alive(Instant::from_millis(600), last, TIMEOUT));
    }

    #[test]
    fn packet_newer_than_clock_read_is_fresh() {
        assert!(is_alive(Instant::from_millis(100), Some(Instant::from_millis(105)), TIMEOUT));
    }
}
