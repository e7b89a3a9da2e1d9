#![allow(dead_code)]

use std::error::Error;

pub use condsched_test_utils::builders;
pub use condsched_test_utils::{collect_steps, init_tracing};

pub type TestResult = Result<(), Box<dyn Error>>;

/// `&[&[&str]]` literal to the shape returned by `collect_steps`.
pub fn steps(expected: &[&[&str]]) -> Vec<Vec<String>> {
    expected
        .iter()
        .map(|set| {
            let mut names: Vec<String> = set.iter().map(|s| s.to_string()).collect();
            names.sort();
            names
        })
        .collect()
}
