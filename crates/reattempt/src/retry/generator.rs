//! Numeric sequence generators that drive backoff delays.

use rand::Rng;
use std::fmt::Debug;

/// A producer of the raw numeric progression consumed by a
/// [`BackoffStrategy`](super::BackoffStrategy).
///
/// Each call to [`next`](Generator::next) returns the next number in the
/// sequence and advances internal state. There is no way to rewind a
/// generator: build a new one to start over.
///
/// # Examples
///
/// ```rust
/// use reattempt::retry::{Generator, fibonacci};
///
/// let mut fib = fibonacci();
/// let first: Vec<i64> = (0..6).map(|_| fib.next()).collect();
/// assert_eq!(first, vec![1, 1, 2, 3, 5, 8]);
/// ```
pub trait Generator: Send + Debug {
    /// Return the next number in the sequence.
    fn next(&mut self) -> i64;
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    fn next(&mut self) -> i64 {
        (**self).next()
    }
}

/// Always returns the same number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant {
    value: i64,
}

/// Create a [`Constant`] generator yielding `value` forever.
pub fn constant(value: i64) -> Constant {
    Constant { value }
}

impl Generator for Constant {
    fn next(&mut self) -> i64 {
        self.value
    }
}

/// Yields `0, delta, 2 * delta, ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Linear {
    delta: i64,
    iteration: i64,
}

/// Create a [`Linear`] generator. The first value is always `0`.
pub fn linear(delta: i64) -> Linear {
    Linear {
        delta,
        iteration: 0,
    }
}

impl Generator for Linear {
    fn next(&mut self) -> i64 {
        let value = self.iteration.saturating_mul(self.delta);
        self.iteration = self.iteration.saturating_add(1);
        value
    }
}

/// Yields `1, factor, factor^2, ...`, saturating at the `i64` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exponential {
    factor: i64,
    iteration: u32,
}

/// Create an [`Exponential`] generator. The first value is always `1`.
pub fn exponential(factor: i64) -> Exponential {
    Exponential {
        factor,
        iteration: 0,
    }
}

impl Generator for Exponential {
    fn next(&mut self) -> i64 {
        let value = self.factor.saturating_pow(self.iteration);
        self.iteration = self.iteration.saturating_add(1);
        value
    }
}

/// Yields the Fibonacci sequence `1, 1, 2, 3, 5, ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fibonacci {
    prev: i64,
    cur: i64,
}

/// Create a [`Fibonacci`] generator.
pub fn fibonacci() -> Fibonacci {
    Fibonacci { prev: 0, cur: 1 }
}

impl Generator for Fibonacci {
    fn next(&mut self) -> i64 {
        let value = self.cur;
        self.cur = self.prev.saturating_add(self.cur);
        self.prev = value;
        value
    }
}

/// Yields uniformly distributed numbers in `[0, max)`.
///
/// A non-positive `max` describes an empty range; the generator then
/// yields `0` on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Random {
    max: i64,
}

/// Create a [`Random`] generator bounded by `max` (exclusive).
pub fn random(max: i64) -> Random {
    Random { max }
}

impl Generator for Random {
    fn next(&mut self) -> i64 {
        if self.max <= 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn take(generator: &mut impl Generator, n: usize) -> Vec<i64> {
        (0..n).map(|_| generator.next()).collect()
    }

    fn fib(n: i64) -> i64 {
        if n <= 1 {
            return n;
        }
        fib(n - 1) + fib(n - 2)
    }

    #[test]
    fn test_constant_generator() {
        let mut generator = constant(10);
        assert_eq!(take(&mut generator, 10), vec![10; 10]);
    }

    #[test]
    fn test_linear_generator() {
        let mut generator = linear(10);
        for i in 0..10 {
            assert_eq!(generator.next(), i * 10);
        }
    }

    #[test]
    fn test_exponential_generator() {
        let mut generator = exponential(10);
        for i in 0..10 {
            assert_eq!(generator.next(), 10_i64.pow(i));
        }
    }

    #[test]
    fn test_exponential_starts_at_one_for_zero_factor() {
        let mut generator = exponential(0);
        assert_eq!(take(&mut generator, 3), vec![1, 0, 0]);
    }

    #[test]
    fn test_fibonacci_generator() {
        let mut generator = fibonacci();
        for i in 0..10 {
            assert_eq!(generator.next(), fib(i + 1));
        }
    }

    #[test]
    fn test_random_generator_bounds() {
        let mut generator = random(10);
        for _ in 0..100 {
            let next = generator.next();
            assert!((0..10).contains(&next), "{next} outside [0, 10)");
        }
    }

    #[test]
    fn test_random_generator_empty_range() {
        assert_eq!(take(&mut random(0), 3), vec![0, 0, 0]);
        assert_eq!(take(&mut random(-5), 3), vec![0, 0, 0]);
    }

    #[test]
    fn test_overflow_saturates() {
        let mut exp = exponential(10);
        let values = take(&mut exp, 25);
        assert_eq!(values[18], 10_i64.pow(18));
        assert!(values[19..].iter().all(|v| *v == i64::MAX));

        let mut negative = exponential(-10);
        let values = take(&mut negative, 21);
        assert_eq!(values[19], i64::MIN);
        assert_eq!(values[20], i64::MAX);

        let mut lin = linear(i64::MAX / 2);
        assert_eq!(take(&mut lin, 4), vec![0, i64::MAX / 2, i64::MAX - 1, i64::MAX]);

        let mut fib = fibonacci();
        let values = take(&mut fib, 120);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(values[119], i64::MAX);
    }

    #[test]
    fn test_boxed_generator_advances_inner_state() {
        let mut boxed: Box<dyn Generator> = Box::new(linear(3));
        assert_eq!(take(&mut boxed, 3), vec![0, 3, 6]);
    }

    proptest! {
        #[test]
        fn prop_constant_never_changes(value in any::<i64>(), n in 1usize..64) {
            prop_assert!(take(&mut constant(value), n).iter().all(|v| *v == value));
        }

        #[test]
        fn prop_linear_is_closed_form(delta in -1_000_000i64..1_000_000, n in 1usize..64) {
            let values = take(&mut linear(delta), n);
            for (i, v) in values.iter().enumerate() {
                prop_assert_eq!(*v, i as i64 * delta);
            }
        }

        #[test]
        fn prop_random_stays_in_range(max in 1i64..i64::MAX, n in 1usize..64) {
            for v in take(&mut random(max), n) {
                prop_assert!((0..max).contains(&v));
            }
        }
    }
}
