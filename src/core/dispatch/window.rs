/// Fixed-size lookback over the latest balance values.
///
/// Also counts the current same-sign run, so that the length of an event
/// of any duration is known without keeping its history.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct SignWindow<const N: usize> {
    values: [f64; N],

    /// Slot the next value goes to.
    head: usize,

    len: usize,

    /// Number of consecutive intervals, up to now, sharing the sign of the latest value.
    run: usize,
}

impl<const N: usize> Default for SignWindow<N> {
    fn default() -> Self {
        Self { values: [0.0; N], head: 0, len: 0, run: 0 }
    }
}

impl<const N: usize> SignWindow<N> {
    pub fn push(&mut self, value: f64) {
        let continues =
            sign(value) != 0 && self.latest().is_some_and(|latest| sign(latest) == sign(value));
        self.run = if continues { self.run + 1 } else if sign(value) == 0 { 0 } else { 1 };
        self.values[self.head] = value;
        self.head = (self.head + 1) % N;
        self.len = (self.len + 1).min(N);
    }

    #[must_use]
    pub fn latest(&self) -> Option<f64> {
        (self.len != 0).then(|| self.values[(self.head + N - 1) % N])
    }

    /// Values in the window, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let start = (self.head + N - self.len) % N;
        (0..self.len).map(move |offset| self.values[(start + offset) % N])
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether all values in the window are strictly of the same sign.
    #[must_use]
    pub fn is_uniform(&self) -> bool {
        self.run >= self.len && self.len != 0
    }

    #[must_use]
    pub const fn run(&self) -> usize {
        self.run
    }
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular() {
        let mut window = SignWindow::<3>::default();
        for value in [1.0, 2.0, 3.0, 4.0] {
            window.push(value);
        }
        assert_eq!(window.iter().collect::<Vec<_>>(), [2.0, 3.0, 4.0]);
        assert_eq!(window.latest(), Some(4.0));
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_run_outlives_window() {
        let mut window = SignWindow::<8>::default();
        for _ in 0..100 {
            window.push(-5.0);
        }
        assert!(window.is_uniform());
        assert_eq!(window.run(), 100);
    }

    #[test]
    fn test_sign_change_resets_run() {
        let mut window = SignWindow::<8>::default();
        for value in [1.0, 1.0, -1.0, 1.0, 1.0] {
            window.push(value);
        }
        assert_eq!(window.run(), 2);
        assert!(!window.is_uniform());
    }

    #[test]
    fn test_zero_breaks_run() {
        let mut window = SignWindow::<2>::default();
        window.push(1.0);
        window.push(0.0);
        assert_eq!(window.run(), 0);
        window.push(1.0);
        assert_eq!(window.run(), 1);
        assert!(!window.is_uniform());
    }
}
