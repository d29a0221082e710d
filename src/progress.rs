use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for a loop of known length; a spinner when the length is unknown.
///
/// indicatif hides the bar when stderr is not a terminal.
pub fn progress_bar(total: Option<u64>, label: &str) -> ProgressBar {
    match total {
        Some(total) if total > 0 => {
            let bar = ProgressBar::new(total);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .map(|style| style.progress_chars("=>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar.set_message(label.to_string());
            bar
        }
        _ => {
            let spinner = ProgressBar::new_spinner();
            let style = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(label.to_string());
            spinner
        }
    }
}
