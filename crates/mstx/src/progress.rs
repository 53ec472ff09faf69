//! 📊 progress.rs: "Are we there yet?" for row ingestion.
//!
//! 🚀 Rows go out one HTTP call at a time, so the interesting numbers are how many rows
//! per second and how many bytes have left the building. A spinner carries a small
//! comfy-table with both, plus the elapsed time.
//!
//! The row source is a stream of unknown length, so there is no percentage and no ETA.
//! We know how far we have come, never how far there is to go. Very zen. 🦆

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

// -- 📏 one mebibyte. not a megabyte. the hill remains occupied.
const MIB: u64 = 1024 * 1024;

// -- 🔄 the rate window. short enough to feel live, long enough not to twitch.
const RATE_WINDOW: Duration = Duration::from_secs(5);

/// 📦 Bytes in whatever unit keeps the number readable.
fn format_bytes(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= 1024 {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}

/// 🔢 "1000000" → "1,000,000".
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS for the long hauls.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

struct Rates {
    rows_per_sec: f64,
    mib_per_sec: f64,
}

/// 📊 Running totals and a live spinner for one ingest.
///
/// Built hidden by default: library callers and tests get the bookkeeping without a
/// terminal full of redraws. The CLI asks for the visible flavour.
pub struct ProgressMetrics {
    /// 🏷️ what is being ingested, usually the index name
    label: String,
    total_bytes: u64,
    total_rows: u64,
    progress_bar: ProgressBar,
    /// 🔄 (timestamp, bytes, rows) samples inside the rate window
    rate_samples: VecDeque<(Instant, u64, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar does not derive Debug, and nobody wants to read one anyway
        f.debug_struct("ProgressMetrics")
            .field("label", &self.label)
            .field("total_bytes", &self.total_bytes)
            .field("total_rows", &self.total_rows)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 A visible spinner when `visible`, a silent bookkeeper otherwise.
    pub fn new(label: impl Into<String>, visible: bool) -> Self {
        let progress_bar = if visible {
            let bar = ProgressBar::new_spinner();
            // -- 🎨 a hardcoded template that fails to parse just means no styling, not no progress
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        } else {
            ProgressBar::hidden()
        };

        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64, 0u64));

        Self {
            label: label.into(),
            total_bytes: 0,
            total_rows: 0,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    /// 🤫 No terminal output at all.
    pub fn hidden(label: impl Into<String>) -> Self {
        Self::new(label, false)
    }

    /// 🔄 Count one more forwarded row of `bytes` encoded bytes.
    pub fn record_row(&mut self, bytes: u64) {
        self.total_bytes += bytes;
        self.total_rows += 1;

        if !self.progress_bar.is_hidden() {
            let rates = self.calculate_rates();
            self.render(rates);
        }
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// ✅ Stop the spinner and leave the last table on screen.
    pub fn finish(&self) {
        self.progress_bar.finish();
    }

    /// 💀 Stop the spinner and clear it. The error message gets the screen.
    pub fn abandon(&self) {
        self.progress_bar.finish_and_clear();
    }

    fn calculate_rates(&mut self) -> Rates {
        let now = Instant::now();
        while let Some(&(timestamp, _, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > RATE_WINDOW {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples.push_back((now, self.total_bytes, self.total_rows));

        if let Some(&(oldest_time, oldest_bytes, oldest_rows)) = self.rate_samples.front() {
            let elapsed = now.duration_since(oldest_time).as_secs_f64();
            if elapsed > 0.0 {
                let bytes_delta = self.total_bytes.saturating_sub(oldest_bytes);
                let rows_delta = self.total_rows.saturating_sub(oldest_rows);
                return Rates {
                    rows_per_sec: rows_delta as f64 / elapsed,
                    mib_per_sec: (bytes_delta as f64 / elapsed) / MIB as f64,
                };
            }
        }

        // -- 💤 first sample, no time has passed, no rate to speak of
        Rates {
            rows_per_sec: 0.0,
            mib_per_sec: 0.0,
        }
    }

    /// 🎨 Two rows, two columns, no borders:
    /// ```text
    /// index: movies
    ///   <rows/s>     <total rows>
    ///   <MiB/s>      <total bytes>
    ///   <elapsed>
    /// ```
    fn render(&self, rates: Rates) {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        table.add_row(vec![
            Cell::new(format!("{} Rows/s", format_number(rates.rows_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} Rows", format_number(self.total_rows))).set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{:.2} MiB/s", rates.mib_per_sec)).set_alignment(CellAlignment::Right),
            Cell::new(format_bytes(self.total_bytes)).set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} elapsed", format_duration(self.elapsed()))).set_alignment(CellAlignment::Right),
        ]);

        self.progress_bar
            .set_message(format!("index: {}\n{}", self.label, table));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_numbers_get_their_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn the_one_where_bytes_pick_a_sensible_unit() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.00 KiB");
        assert_eq!(format_bytes(3 * MIB), "3.00 MiB");
    }

    #[test]
    fn the_one_where_long_runs_grow_an_hours_column() {
        assert_eq!(format_duration(Duration::from_secs(75)), "01:15");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "01:02:05");
    }

    #[test]
    fn the_one_where_hidden_metrics_still_keep_count() {
        let mut metrics = ProgressMetrics::hidden("movies");
        metrics.record_row(10);
        metrics.record_row(32);
        metrics.finish();
        assert_eq!(metrics.total_rows(), 2);
        assert_eq!(metrics.total_bytes(), 42);
    }

    #[test]
    fn the_one_where_the_visible_spinner_renders_without_a_fuss() {
        let mut metrics = ProgressMetrics::new("movies", true);
        metrics.record_row(5);
        metrics.abandon();
        assert_eq!(metrics.total_rows(), 1);
    }
}
