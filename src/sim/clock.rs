use chrono::NaiveDateTime;

use crate::series::Frequency;

/// A simulation clock stepping through a regular date grid.
///
/// The `DateGrid` yields `total` timestamps spaced one sampling step apart,
/// either one at a time with [`DateGrid::tick`] or all at once with
/// [`DateGrid::run`].
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use irradiance_sim::series::Frequency;
/// use irradiance_sim::sim::clock::DateGrid;
///
/// let start = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let mut grid = DateGrid::new(start, Frequency::DAILY, 3);
/// let mut days = Vec::new();
///
/// grid.run(|ts| days.push(ts.date().to_string()));
/// assert_eq!(days, vec!["2024-02-28", "2024-02-29", "2024-03-01"]);
/// ```
#[derive(Debug, Clone)]
pub struct DateGrid {
    /// First timestamp of the grid
    start: NaiveDateTime,
    /// Spacing between timestamps
    frequency: Frequency,
    /// Index of the next timestamp
    current: usize,
    /// Total timestamps in the grid
    total: usize,
}

impl DateGrid {
    /// Creates a grid of `total` timestamps starting at `start`.
    ///
    /// # Arguments
    ///
    /// * `start` - The first timestamp
    /// * `frequency` - Spacing between consecutive timestamps
    /// * `total` - The number of timestamps the grid yields
    pub fn new(start: NaiveDateTime, frequency: Frequency, total: usize) -> Self {
        Self {
            start,
            frequency,
            current: 0,
            total,
        }
    }

    /// Creates the grid from `start` to `end` inclusive; empty if `end < start`.
    pub fn between(start: NaiveDateTime, end: NaiveDateTime, frequency: Frequency) -> Self {
        let total = if end < start {
            0
        } else {
            frequency.steps_between(start, end) as usize + 1
        };
        Self::new(start, frequency, total)
    }

    /// Number of timestamps in the grid.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Timestamp at position `index`.
    pub fn at(&self, index: usize) -> NaiveDateTime {
        self.start + self.frequency.step() * index as i32
    }

    /// Advances the grid by one step.
    ///
    /// # Returns
    ///
    /// * `Some(ts)` - The next timestamp
    /// * `None` - If every timestamp has been yielded
    pub fn tick(&mut self) -> Option<NaiveDateTime> {
        if self.current < self.total {
            let ts = self.at(self.current);
            self.current += 1;
            Some(ts)
        } else {
            None
        }
    }

    /// Runs a function for each remaining timestamp.
    pub fn run(&mut self, mut f: impl FnMut(NaiveDateTime)) {
        while let Some(ts) = self.tick() {
            f(ts);
        }
    }
}
