//! Backoff exponencial para reconexão ao broker.

use std::time::Duration;
use tank_core::config::RECONNECT_CEILING_SECS;

/// Piso absoluto entre tentativas.
pub const MIN_DELAY_FLOOR: Duration = Duration::from_secs(1);
/// Teto absoluto entre tentativas, qualquer que seja a config.
pub const MAX_DELAY_CEILING: Duration = Duration::from_secs(RECONNECT_CEILING_SECS);

/// Dobra a espera a cada falha, entre `min` e `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let min = min.clamp(MIN_DELAY_FLOOR, MAX_DELAY_CEILING);
        let max = max.clamp(min, MAX_DELAY_CEILING);
        Self { min, max, current: min }
    }

    pub fn from_secs(min: u64, max: u64) -> Self {
        Self::new(Duration::from_secs(min), Duration::from_secs(max))
    }

    /// Espera para a próxima tentativa.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Chamado após conectar com sucesso.
    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_cap() {
        let mut b = Backoff::from_secs(1, 120);
        let seq: Vec<u64> = (0..10).map(|_| b.next_delay().as_secs()).collect();
        assert_eq!(seq, vec![1, 2, 4, 8, 16, 32, 64, 120, 120, 120]);
    }

    #[test]
    fn always_within_bounds() {
        let mut b = Backoff::from_secs(1, 120);
        for _ in 0..1000 {
            let d = b.next_delay();
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(120));
        }
    }

    #[test]
    fn reset_returns_to_min() {
        let mut b = Backoff::from_secs(1, 120);
        for _ in 0..5 {
            b.next_delay();
        }
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn bad_bounds_are_clamped() {
        let mut b = Backoff::new(Duration::ZERO, Duration::from_millis(10));
        assert_eq!(b.next_delay(), Duration::from_secs(1));
        assert_eq!(b.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn max_above_ceiling_is_clamped() {
        let mut b = Backoff::from_secs(1, 300);
        let seq: Vec<u64> = (0..10).map(|_| b.next_delay().as_secs()).collect();
        assert_eq!(seq, vec![1, 2, 4, 8, 16, 32, 64, 120, 120, 120]);

        let mut b = Backoff::from_secs(500, 900);
        assert_eq!(b.next_delay(), MAX_DELAY_CEILING);
        assert_eq!(b.next_delay(), MAX_DELAY_CEILING);
    }
}
