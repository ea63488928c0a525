//! Process signal mask
//!
//! Before the runtime starts, every signal is blocked except the ones a
//! process must always be able to receive, plus the signals the platform's
//! thread library reserves for itself.

use std::io;

#[cfg(unix)]
use std::str::FromStr;

#[cfg(unix)]
use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow, Signal};
use tracing::debug;

/// Signals never blocked, whatever the platform
pub const ALWAYS_DELIVERABLE: &[&str] = &[
    "SIGABRT", "SIGILL", "SIGKILL", "SIGCONT", "SIGSTOP", "SIGSEGV", "SIGBUS",
];

/// Thread library flavour, which decides the reserved signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadingModel {
    LinuxThreads,
    FreeBsdThreads,
    Plain,
}

impl ThreadingModel {
    pub fn detect() -> Self {
        Self::for_os(std::env::consts::OS)
    }

    pub fn for_os(os: &str) -> Self {
        match os {
            "linux" | "android" => ThreadingModel::LinuxThreads,
            "freebsd" | "dragonfly" => ThreadingModel::FreeBsdThreads,
            _ => ThreadingModel::Plain,
        }
    }

    /// Signals the thread library uses internally
    pub fn reserved_signals(self) -> &'static [&'static str] {
        match self {
            ThreadingModel::LinuxThreads => &["SIGPWR", "SIGXCPU", "SIGUSR1", "SIGUSR2"],
            ThreadingModel::FreeBsdThreads => &["SIGUSR1", "SIGUSR2"],
            ThreadingModel::Plain => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalPlan {
    model: ThreadingModel,
}

impl SignalPlan {
    pub fn for_model(model: ThreadingModel) -> Self {
        Self { model }
    }

    pub fn detect() -> Self {
        Self::for_model(ThreadingModel::detect())
    }

    pub fn model(&self) -> ThreadingModel {
        self.model
    }

    /// Names of the signals left unblocked
    pub fn deliverable(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = ALWAYS_DELIVERABLE.to_vec();
        for name in self.model.reserved_signals() {
            if !names.contains(name) {
                names.push(name);
            }
        }
        names
    }

    /// The set to install as the process mask
    #[cfg(unix)]
    pub fn blocked_set(&self) -> SigSet {
        let mut set = SigSet::all();
        for name in self.deliverable() {
            // names the host does not define are skipped
            if let Ok(signal) = Signal::from_str(name) {
                set.remove(signal);
            }
        }
        set
    }

    /// Install the mask on the calling thread
    #[cfg(unix)]
    pub fn apply(&self) -> io::Result<()> {
        let set = self.blocked_set();
        pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&set), None).map_err(io::Error::from)?;
        debug!("signal mask installed for {:?}", self.model);
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn apply(&self) -> io::Result<()> {
        debug!("signal mask not supported on this platform");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_for_os() {
        assert_eq!(ThreadingModel::for_os("linux"), ThreadingModel::LinuxThreads);
        assert_eq!(ThreadingModel::for_os("freebsd"), ThreadingModel::FreeBsdThreads);
        assert_eq!(ThreadingModel::for_os("macos"), ThreadingModel::Plain);
    }

    #[test]
    fn test_deliverable_signals() {
        let plain = SignalPlan::for_model(ThreadingModel::Plain).deliverable();
        assert_eq!(plain, ALWAYS_DELIVERABLE.to_vec());

        let linux = SignalPlan::for_model(ThreadingModel::LinuxThreads).deliverable();
        assert_eq!(linux.len(), ALWAYS_DELIVERABLE.len() + 4);
        assert!(linux.contains(&"SIGPWR"));
        assert!(linux.contains(&"SIGUSR2"));

        let bsd = SignalPlan::for_model(ThreadingModel::FreeBsdThreads).deliverable();
        assert!(bsd.contains(&"SIGUSR1"));
        assert!(!bsd.contains(&"SIGPWR"));
    }

    #[cfg(unix)]
    #[test]
    fn test_blocked_set_leaves_deliverable_signals_out() {
        let set = SignalPlan::for_model(ThreadingModel::Plain).blocked_set();
        assert!(set.contains(Signal::SIGINT));
        assert!(set.contains(Signal::SIGTERM));
        assert!(set.contains(Signal::SIGUSR1));
        assert!(!set.contains(Signal::SIGSEGV));
        assert!(!set.contains(Signal::SIGABRT));

        let set = SignalPlan::for_model(ThreadingModel::FreeBsdThreads).blocked_set();
        assert!(!set.contains(Signal::SIGUSR1));
        assert!(!set.contains(Signal::SIGUSR2));
    }
}
