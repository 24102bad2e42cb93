use std::fmt;

/// Where and how much to print.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Printer {
    /// Regular output.
    #[default]
    Default,
    /// Regular output, but progress bars suppressed.
    NoProgress,
    /// Only important messages (failures).
    Quiet,
    /// No output at all.
    Silent,
    /// Regular output plus verbose details.
    Verbose,
}

impl Printer {
    pub(crate) fn stdout(self) -> Stdout {
        match self {
            Self::Default | Self::NoProgress | Self::Verbose => Stdout::enabled(),
            Self::Quiet | Self::Silent => Stdout::disabled(),
        }
    }

    /// Output that survives `--quiet`, e.g. failure reports.
    pub(crate) fn stdout_important(self) -> Stdout {
        match self {
            Self::Silent => Stdout::disabled(),
            _ => Stdout::enabled(),
        }
    }

    pub(crate) fn stderr(self) -> Stderr {
        match self {
            Self::Default | Self::NoProgress | Self::Verbose => Stderr::enabled(),
            Self::Quiet | Self::Silent => Stderr::disabled(),
        }
    }

    pub(crate) fn allows_progress(self) -> bool {
        matches!(self, Self::Default | Self::Verbose)
    }
}

pub(crate) struct Stdout {
    enabled: bool,
}

impl Stdout {
    fn enabled() -> Self {
        Self { enabled: true }
    }

    fn disabled() -> Self {
        Self { enabled: false }
    }
}

impl fmt::Write for Stdout {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.enabled {
            anstream::print!("{s}");
        }
        Ok(())
    }
}

pub(crate) struct Stderr {
    enabled: bool,
}

impl Stderr {
    fn enabled() -> Self {
        Self { enabled: true }
    }

    fn disabled() -> Self {
        Self { enabled: false }
    }
}

impl fmt::Write for Stderr {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.enabled {
            anstream::eprint!("{s}");
        }
        Ok(())
    }
}
