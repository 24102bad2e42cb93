use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::printer::Printer;

/// Progress feedback for the slow parts of preparing a run: cloning hook
/// repositories and installing language environments.
pub(crate) struct PrepareReporter {
    multi: Option<MultiProgress>,
}

fn spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("static template must parse"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

impl PrepareReporter {
    pub(crate) fn new(printer: Printer) -> Self {
        let multi = printer.allows_progress().then(MultiProgress::new);
        Self { multi }
    }

    pub(crate) fn on_clone_start(&self, repo: &str) -> Option<ProgressBar> {
        self.multi
            .as_ref()
            .map(|multi| multi.add(spinner(format!("Cloning {repo}"))))
    }

    pub(crate) fn on_clone_complete(&self, bar: Option<ProgressBar>) {
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
    }

    pub(crate) fn on_install_start(&self, hook: &str) -> Option<ProgressBar> {
        self.multi
            .as_ref()
            .map(|multi| multi.add(spinner(format!("Installing environment for {hook}"))))
    }

    pub(crate) fn on_install_complete(&self, bar: Option<ProgressBar>) {
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
    }

    pub(crate) fn clear(&self) {
        if let Some(multi) = &self.multi {
            let _ = multi.clear();
        }
    }
}
