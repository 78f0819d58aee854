/// Shared counter: a value plus the direction the next step moves it.
///
/// The value has a single writer (the agent loop) and any number of readers.
/// Direction may be flipped from any context; the last write wins and takes
/// effect on the next `step()`. Overflow wraps (two's complement), matching
/// `AtomicI64::fetch_add`.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, AtomicI8, Ordering};

/// Which way the counter moves on each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Up,
    Down,
}

impl Direction {
    /// Signed step applied to the value.
    pub fn delta(self) -> i8 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }

    fn from_delta(delta: i8) -> Self {
        if delta < 0 {
            Direction::Down
        } else {
            Direction::Up
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("unknown direction '{other}' (expected 'up' or 'down')")),
        }
    }
}

#[derive(Debug)]
pub struct Counter {
    value: AtomicI64,
    direction: AtomicI8,
}

impl Counter {
    pub fn new(start: i64, direction: Direction) -> Self {
        Self {
            value: AtomicI64::new(start),
            direction: AtomicI8::new(direction.delta()),
        }
    }

    /// Current value. Safe to call concurrently with `step()`.
    pub fn read(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Apply one step in the current direction and return the new value.
    ///
    /// Intended for the agent loop only. The store is an atomic RMW so
    /// concurrent readers always see a whole value.
    pub fn step(&self) -> i64 {
        let delta = i64::from(self.direction.load(Ordering::Acquire));
        self.value
            .fetch_add(delta, Ordering::AcqRel)
            .wrapping_add(delta)
    }

    pub fn set_direction(&self, direction: Direction) {
        self.direction.store(direction.delta(), Ordering::Release);
    }

    pub fn direction(&self) -> Direction {
        Direction::from_delta(self.direction.load(Ordering::Acquire))
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new(0, Direction::Up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_counter_starts_at_value() {
        let counter = Counter::new(7, Direction::Up);
        assert_eq!(counter.read(), 7);
        assert_eq!(counter.direction(), Direction::Up);
    }

    #[test]
    fn test_step_up_and_down() {
        let counter = Counter::default();
        assert_eq!(counter.step(), 1);
        assert_eq!(counter.step(), 2);
        counter.set_direction(Direction::Down);
        assert_eq!(counter.step(), 1);
        assert_eq!(counter.step(), 0);
        assert_eq!(counter.step(), -1);
        assert_eq!(counter.read(), -1);
    }

    #[test]
    fn test_last_direction_wins() {
        let counter = Counter::default();
        counter.set_direction(Direction::Down);
        counter.set_direction(Direction::Up);
        counter.set_direction(Direction::Down);
        assert_eq!(counter.direction(), Direction::Down);
        assert_eq!(counter.step(), -1);
    }

    #[test]
    fn test_overflow_wraps() {
        let counter = Counter::new(i64::MAX, Direction::Up);
        assert_eq!(counter.step(), i64::MIN);
        counter.set_direction(Direction::Down);
        assert_eq!(counter.step(), i64::MAX);
    }

    #[test]
    fn test_reads_see_steps_from_other_thread() {
        let counter = Arc::new(Counter::default());
        let writer = Arc::clone(&counter);
        let handle = std::thread::spawn(move || {
            for _ in 0..1000 {
                writer.step();
            }
        });
        let mut last = counter.read();
        while !handle.is_finished() {
            let now = counter.read();
            assert!(now >= last, "value went backwards: {last} -> {now}");
            last = now;
        }
        handle.join().unwrap();
        assert_eq!(counter.read(), 1000);
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("up".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!(" DOWN ".parse::<Direction>().unwrap(), Direction::Down);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_direction_display_matches_parse() {
        for d in [Direction::Up, Direction::Down] {
            assert_eq!(d.to_string().parse::<Direction>().unwrap(), d);
        }
    }
}
