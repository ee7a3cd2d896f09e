use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

///
/// measure time in milli-seconds (ms) of closure.
///
pub fn timer<F, T>(f: F) -> (T, u128)
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let ret = f();
    let duration = start.elapsed();
    (ret, duration.as_millis())
}

///
/// measure time in micro seconds (us) of closure.
///
pub fn timer_us<F, T>(f: F) -> (T, u128)
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let ret = f();
    let duration = start.elapsed();
    (ret, duration.as_micros())
}

pub fn progress_common_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

///
/// progress bar of `n` steps, hidden if `show` is false
///
pub fn progress_bar(n: usize, show: bool) -> ProgressBar {
    if show {
        ProgressBar::new(n as u64).with_style(progress_common_style())
    } else {
        ProgressBar::hidden()
    }
}
