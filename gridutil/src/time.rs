use std::io::{stdout, Write};
use std::time::Instant;

use crate::{prettyprint_usize, PROGRESS_FREQUENCY_SECONDS};

pub fn elapsed_seconds(since: Instant) -> f64 {
    let dt = since.elapsed();
    (dt.as_secs() as f64) + (f64::from(dt.subsec_nanos()) * 1e-9)
}

fn prettyprint_time(seconds: f64) -> String {
    format!("{:.4}s", seconds)
}

struct Progress {
    label: String,
    processed_items: usize,
    total_items: usize,
    started_at: Instant,
    last_printed_at: Instant,
}

impl Progress {
    fn new(label: String, total_items: usize) -> Progress {
        Progress {
            label,
            processed_items: 0,
            total_items,
            started_at: Instant::now(),
            last_printed_at: Instant::now(),
        }
    }

    // Returns the summary line when done.
    fn next(&mut self) -> Option<(f64, String)> {
        self.processed_items += 1;
        if self.processed_items > self.total_items {
            panic!(
                "{} is too few items for {} progress",
                prettyprint_usize(self.total_items),
                self.label
            );
        }

        if self.processed_items == self.total_items {
            let elapsed = elapsed_seconds(self.started_at);
            let line = format!(
                "{} ({})... {}",
                self.label,
                prettyprint_usize(self.total_items),
                prettyprint_time(elapsed)
            );
            println!("{}", line);
            return Some((elapsed, line));
        } else if elapsed_seconds(self.last_printed_at) >= PROGRESS_FREQUENCY_SECONDS {
            self.last_printed_at = Instant::now();
            print!(
                "\r{}: {}/{}... {}",
                self.label,
                prettyprint_usize(self.processed_items),
                prettyprint_usize(self.total_items),
                prettyprint_time(elapsed_seconds(self.started_at))
            );
            stdout().flush().unwrap();
        }
        None
    }
}

struct TimerSpan {
    name: String,
    started_at: Instant,
    nested_results: Vec<String>,
    nested_time: f64,
}

enum StackEntry {
    TimerSpan(TimerSpan),
    Progress(Progress),
}

/// Hierarchical stopwatch for the batch stages. Print-heavy on purpose; this is a
/// long-running import-style job and seeing where time goes matters.
pub struct Timer {
    results: Vec<String>,
    stack: Vec<StackEntry>,

    outermost_name: String,
    warnings: Vec<String>,
}

impl Timer {
    pub fn new<S: Into<String>>(raw_name: S) -> Timer {
        let name = raw_name.into();
        let mut t = Timer {
            results: Vec::new(),
            stack: Vec::new(),
            outermost_name: name.clone(),
            warnings: Vec::new(),
        };
        t.start(name);
        t
    }

    pub fn throwaway() -> Timer {
        Timer::new("throwaway")
    }

    pub fn start<S: Into<String>>(&mut self, raw_name: S) {
        let name = raw_name.into();
        println!("{}...", name);
        self.stack.push(StackEntry::TimerSpan(TimerSpan {
            name,
            started_at: Instant::now(),
            nested_results: Vec::new(),
            nested_time: 0.0,
        }));
    }

    pub fn stop<S: Into<String>>(&mut self, raw_name: S) {
        let name = raw_name.into();
        let span = match self.stack.pop() {
            Some(StackEntry::TimerSpan(s)) => s,
            _ => panic!("stop() called, but a span isn't on the top of the stack"),
        };
        assert_eq!(span.name, name, "timer spans improperly nested");

        let elapsed = elapsed_seconds(span.started_at);
        let line = format!("- {} took {}", name, prettyprint_time(elapsed));

        let padding = "  ".repeat(self.stack.len());
        let mut lines = Vec::new();
        lines.push(format!("{}{}", padding, line));
        for l in span.nested_results {
            lines.push(format!("{}  {}", padding, l));
        }
        if span.nested_time != 0.0 && elapsed - span.nested_time >= 0.1 {
            lines.push(format!(
                "{}  - ... plus {} of uncategorized time",
                padding,
                prettyprint_time(elapsed - span.nested_time)
            ));
        }

        match self.stack.last_mut() {
            Some(StackEntry::TimerSpan(ref mut parent)) => {
                parent.nested_results.extend(lines);
                parent.nested_time += elapsed;
            }
            None => {
                self.results.extend(lines);
                assert_eq!(name, self.outermost_name);
                self.finish();
            }
            Some(StackEntry::Progress(_)) => {
                panic!("stop() called while a start_iter is still in progress")
            }
        }
        println!("{} took {}", name, prettyprint_time(elapsed));
    }

    pub fn start_iter<S: Into<String>>(&mut self, raw_name: S, total_items: usize) {
        if total_items == 0 {
            return;
        }
        if let Some(StackEntry::Progress(_)) = self.stack.last() {
            panic!("Can't start_iter while Progress is top of the stack");
        }
        self.stack
            .push(StackEntry::Progress(Progress::new(raw_name.into(), total_items)));
    }

    pub fn next(&mut self) {
        let done = if let Some(StackEntry::Progress(ref mut progress)) = self.stack.last_mut() {
            progress.next()
        } else {
            panic!("next() while no Progress on the stack");
        };
        if let Some((elapsed, line)) = done {
            self.stack.pop();
            match self.stack.last_mut() {
                Some(StackEntry::TimerSpan(ref mut span)) => {
                    span.nested_results.push(format!("- {}", line));
                    span.nested_time += elapsed;
                }
                None => {
                    self.results.push(format!("- {}", line));
                }
                Some(StackEntry::Progress(_)) => unreachable!(),
            }
        }
    }

    /// Logged now, and repeated in the final summary so it doesn't scroll away.
    pub fn warn(&mut self, line: String) {
        log::warn!("{}", line);
        self.warnings.push(line);
    }

    /// Used to end the scope of a timer early.
    pub fn done(self) {}

    fn finish(&mut self) {
        println!();
        for line in &self.results {
            println!("{}", line);
        }
        println!();
        if !self.warnings.is_empty() {
            println!("{} warnings:", prettyprint_usize(self.warnings.len()));
            for line in &self.warnings {
                println!("{}", line);
            }
            println!();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if self.stack.len() == 1 {
            // The outermost span was never stopped; do it now.
            if let Some(StackEntry::TimerSpan(ref span)) = self.stack.first() {
                let name = span.name.clone();
                self.stop(name);
            }
        }
    }
}

/// Runs the callback over all requests on a worker pool, returning results in the same order as
/// the input. The ordering makes downstream output deterministic no matter the worker count.
pub fn parallelize<I, O, F: Fn(I) -> O + Sync>(
    timer: &mut Timer,
    timer_name: &str,
    requests: Vec<I>,
    cb: F,
) -> Vec<O>
where
    I: Send,
    O: Send,
{
    let total = requests.len();
    timer.start_iter(timer_name, total);

    let mut pool = scoped_threadpool::Pool::new(num_cpus::get() as u32);
    let (tx, rx) = std::sync::mpsc::channel();
    let mut results: Vec<Option<O>> = std::iter::repeat_with(|| None).take(total).collect();
    pool.scoped(|scope| {
        let cb = &cb;
        for (idx, req) in requests.into_iter().enumerate() {
            let tx = tx.clone();
            scope.execute(move || {
                tx.send((idx, cb(req))).unwrap();
            });
        }
        drop(tx);
        for (idx, result) in rx.iter() {
            timer.next();
            results[idx] = Some(result);
        }
    });

    results.into_iter().map(|x| x.unwrap()).collect()
}
