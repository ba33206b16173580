//! A-B-A-B oscillation detection over recent stage names.

use std::collections::VecDeque;

/// Number of stage names the detector remembers.
pub const WINDOW_CAPACITY: usize = 4;

/// Escalation reason reported when a 2-cycle is detected.
pub const OSCILLATION_DETECTED: &str = "oscillation_detected";

/// Sliding-window detector for a 2-cycle in the stage execution sequence.
///
/// The window is a FIFO of the last [`WINDOW_CAPACITY`] names. A cycle is
/// flagged when the window reads `A, B, A, B`.
#[derive(Debug, Clone, Default)]
pub struct OscillationDetector {
    window: VecDeque<String>,
}

impl OscillationDetector {
    /// Creates an empty detector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(WINDOW_CAPACITY),
        }
    }

    /// Records a stage execution and reports whether the window oscillates.
    ///
    /// Always false until four names have been recorded.
    pub fn step(&mut self, name: &str) -> bool {
        if self.window.len() == WINDOW_CAPACITY {
            self.window.pop_front();
        }
        self.window.push_back(name.to_string());

        if self.window.len() < WINDOW_CAPACITY {
            return false;
        }

        let n = self.window.len();
        self.window[n - 4] == self.window[n - 2] && self.window[n - 3] == self.window[n - 1]
    }

    /// Clears the window.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Returns the remembered names, oldest first.
    #[must_use]
    pub fn window(&self) -> Vec<String> {
        self.window.iter().cloned().collect()
    }

    /// Returns the number of remembered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(detector: &mut OscillationDetector, names: &[&str]) -> Vec<bool> {
        names.iter().map(|n| detector.step(n)).collect()
    }

    #[test]
    fn test_abab_detected_on_fourth_step() {
        let mut detector = OscillationDetector::new();
        assert_eq!(
            feed(&mut detector, &["A", "B", "A", "B"]),
            vec![false, false, false, true]
        );
    }

    #[test]
    fn test_distinct_names_never_flag() {
        let mut detector = OscillationDetector::new();
        assert_eq!(
            feed(&mut detector, &["A", "B", "C", "D"]),
            vec![false; 4]
        );
    }

    #[test]
    fn test_first_three_calls_false_even_if_repeating() {
        let mut detector = OscillationDetector::new();
        assert_eq!(feed(&mut detector, &["A", "A", "A"]), vec![false; 3]);
        // A,A,A,A is a degenerate 2-cycle.
        assert!(detector.step("A"));
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut detector = OscillationDetector::new();
        feed(&mut detector, &["X", "A", "B", "A"]);
        assert_eq!(detector.window(), vec!["X", "A", "B", "A"]);

        // X evicted; window is A,B,A,B
        assert!(detector.step("B"));
        assert_eq!(detector.len(), WINDOW_CAPACITY);
        assert_eq!(detector.window(), vec!["A", "B", "A", "B"]);
    }

    #[test]
    fn test_cycle_keeps_flagging_while_it_continues() {
        let mut detector = OscillationDetector::new();
        assert_eq!(
            feed(&mut detector, &["A", "B", "A", "B", "A", "C"]),
            vec![false, false, false, true, true, false]
        );
    }

    #[test]
    fn test_reset() {
        let mut detector = OscillationDetector::new();
        feed(&mut detector, &["A", "B", "A"]);
        detector.reset();
        assert!(detector.is_empty());
        assert!(!detector.step("B"));
    }
}
