#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the bus directory tools.
//!
//! [`BusImportBar`] renders bus import progress, and [`init_logger`] routes
//! `log` output through the same [`MultiProgress`] so log lines don't tear
//! the bar.

use std::sync::Arc;
use std::time::Duration;

use bus_directory_database::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Shown while the import file is read and parsed.
const READING_TEMPLATE: &str = "{spinner:.cyan} Reading buses from {msg}";

/// Shown once the number of bus entries is known. `{msg}` is the license
/// number currently being created.
const IMPORT_TEMPLATE: &str =
    "  {msg:<12} {wide_bar:.cyan/dim} {pos}/{len} buses {percent}% [{eta}]";

/// Progress bar for `bus_directory import`, driven through
/// [`ProgressCallback`].
pub struct BusImportBar {
    bar: ProgressBar,
    import_style: ProgressStyle,
}

impl BusImportBar {
    /// Adds a bar to `multi` that spins on `source` (the import file) until
    /// [`ProgressCallback::set_total()`] reports how many bus entries it
    /// holds, then counts buses with percentage and ETA.
    #[must_use]
    pub fn start(multi: &MultiProgress, source: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        Arc::new(Self::on(bar, source))
    }

    fn on(bar: ProgressBar, source: &str) -> Self {
        bar.set_style(
            ProgressStyle::with_template(READING_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(source.to_string());

        let import_style = ProgressStyle::with_template(IMPORT_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self { bar, import_style }
    }
}

impl ProgressCallback for BusImportBar {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.import_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, license_no: String) {
        self.bar.set_message(license_no);
    }

    fn finish(&self, summary: String) {
        self.bar.finish_with_message(summary);
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set when several tests initialise logging.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
