//! Shared plumbing for the pipeline crates: a hierarchical timer with progress printing,
//! logging setup, a barebones CLI flag parser, counters, and file I/O helpers.

mod cli;
mod collections;
mod io;
mod logger;
mod time;

pub use crate::cli::CmdArgs;
pub use crate::collections::Counter;
pub use crate::io::{slurp_file, write_file};
pub use crate::time::{elapsed_seconds, parallelize, Timer};

const PROGRESS_FREQUENCY_SECONDS: f64 = 0.2;

/// 1234567 -> "1,234,567"
pub fn prettyprint_usize(x: usize) -> String {
    let num = format!("{}", x);
    let mut result = String::new();
    let mut i = num.len();
    for c in num.chars() {
        result.push(c);
        i -= 1;
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
    }
    result
}
