//! Shared fixtures for the integration tests

use std::sync::Arc;

use arrow::array::{Date32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use mace_seq::schema::date_to_days;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Day number of a calendar date
#[must_use]
pub fn day(year: i32, month: u32, date: u32) -> i32 {
    date_to_days(NaiveDate::from_ymd_opt(year, month, date).unwrap())
}

/// Event table with `person_id, concept_id, event_date`
#[must_use]
pub fn events_batch(rows: &[(i64, i64, i32)]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("person_id", DataType::Int64, true),
        Field::new("concept_id", DataType::Int64, true),
        Field::new("event_date", DataType::Date32, true),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.0))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.1))),
            Arc::new(Date32Array::from_iter_values(rows.iter().map(|r| r.2))),
        ],
    )
    .unwrap()
}

/// Two-column table of a person id and a nullable date
#[must_use]
pub fn dated_batch(column: &str, rows: &[(i64, Option<i32>)]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("person_id", DataType::Int64, true),
        Field::new(column, DataType::Date32, true),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.0))),
            Arc::new(rows.iter().map(|r| r.1).collect::<Date32Array>()),
        ],
    )
    .unwrap()
}

/// Two-column table of a person id and a date stored as text
#[must_use]
pub fn text_dated_batch(column: &str, rows: &[(i64, Option<&str>)]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("person_id", DataType::Int64, true),
        Field::new(column, DataType::Utf8, true),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.0))),
            Arc::new(rows.iter().map(|r| r.1).collect::<StringArray>()),
        ],
    )
    .unwrap()
}

/// Death table with `person_id, first_exposure_date, death_date`
#[must_use]
pub fn deaths_batch(rows: &[(i64, i32, Option<i32>)]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("person_id", DataType::Int64, true),
        Field::new("first_exposure_date", DataType::Date32, true),
        Field::new("death_date", DataType::Date32, true),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.0))),
            Arc::new(Date32Array::from_iter_values(rows.iter().map(|r| r.1))),
            Arc::new(rows.iter().map(|r| r.2).collect::<Date32Array>()),
        ],
    )
    .unwrap()
}

/// A generated cohort with its raw rows kept for independent checks
#[derive(Debug, Clone)]
pub struct Cohort {
    /// `(person_id, concept_id, event_day)` in table order
    pub events: Vec<(i64, i64, i32)>,
    /// `(person_id, index_day)`
    pub index: Vec<(i64, Option<i32>)>,
    /// `(person_id, first_mace_day)`
    pub outcomes: Vec<(i64, Option<i32>)>,
}

impl Cohort {
    /// Random cohort of up to `patients` persons, reproducible from `seed`
    ///
    /// Person ids are sparse and events arrive shuffled. Some patients have no
    /// events, some no index date and some a missing outcome date.
    #[must_use]
    pub fn generate(seed: u64, patients: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let base = day(2020, 1, 1);
        let mut events = Vec::new();
        let mut index = Vec::new();
        let mut outcomes = Vec::new();

        for n in 0..patients {
            let person_id = 1000 + (n as i64) * 17;
            let event_count = rng.random_range(0..40);
            for _ in 0..event_count {
                let code = rng.random_range(100..140);
                let event_day = base + rng.random_range(0..500);
                events.push((person_id, code, event_day));
            }

            if rng.random_bool(0.9) {
                let index_day = base + rng.random_range(0..200);
                index.push((person_id, Some(index_day)));
                if rng.random_bool(0.5) {
                    let outcome_day = if rng.random_bool(0.1) {
                        None
                    } else {
                        Some(index_day + rng.random_range(-20..400))
                    };
                    outcomes.push((person_id, outcome_day));
                }
            }
        }
        events.shuffle(&mut rng);

        Self {
            events,
            index,
            outcomes,
        }
    }

    #[must_use]
    pub fn events_batch(&self) -> RecordBatch {
        events_batch(&self.events)
    }

    #[must_use]
    pub fn index_batch(&self) -> RecordBatch {
        dated_batch("index_date", &self.index)
    }

    #[must_use]
    pub fn outcomes_batch(&self) -> RecordBatch {
        dated_batch("first_mace_date", &self.outcomes)
    }

    /// One person's `(codes, days)` in the order the pipeline tokenizes them
    #[must_use]
    pub fn history(&self, person_id: i64) -> (Vec<Option<i64>>, Vec<i32>) {
        let mut rows: Vec<(i64, i32)> = self
            .events
            .iter()
            .filter(|e| e.0 == person_id)
            .map(|e| (e.1, e.2))
            .collect();
        rows.sort_by_key(|r| r.1);
        rows.into_iter().map(|(code, d)| (Some(code), d)).unzip()
    }

    /// Expected outcome label computed row by row
    #[must_use]
    pub fn expected_outcome(&self, person_id: i64, lower: i32, upper: i32) -> u8 {
        let index_day = self
            .index
            .iter()
            .filter(|r| r.0 == person_id)
            .filter_map(|r| r.1)
            .min();
        let outcome_day = self
            .outcomes
            .iter()
            .filter(|r| r.0 == person_id)
            .filter_map(|r| r.1)
            .min();
        match (index_day, outcome_day) {
            (Some(i), Some(o)) => u8::from((lower..=upper).contains(&(o - i))),
            _ => 0,
        }
    }
}
