/// Step-decay learning-rate schedule:
/// `initial * decay_rate ^ floor(epoch / decay_period)`.
///
/// The epoch number is absolute, so a resumed run (nonzero
/// starting epoch) lands on the same rate the original run
/// would have used.
pub fn step_decay(initial: f64, decay_rate: f64, decay_period: usize, epoch: usize) -> f64 {
    initial * decay_rate.powi((epoch / decay_period.max(1)) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_within_a_period_and_steps_between() {
        for epoch in 0..10 {
            assert_eq!(step_decay(0.01, 0.97, 10, epoch), 0.01);
        }
        for epoch in 10..20 {
            assert!((step_decay(0.01, 0.97, 10, epoch) - 0.0097).abs() < 1e-12);
        }
        let rate25 = step_decay(0.01, 0.97, 10, 25);
        assert!((rate25 - 0.0097 * 0.97).abs() < 1e-12);
        assert!((rate25 - 0.009409).abs() < 1e-6);
    }

    #[test]
    fn zero_period_clamps_to_one() {
        // period 0 is clamped to 1, so decay applies every epoch
        assert!((step_decay(1.0, 0.5, 0, 3) - 0.125).abs() < 1e-12);
    }
}
