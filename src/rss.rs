use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

/// Samples the current process's resident memory, used as a proxy for
/// a policy's out-of-band metadata overhead. Never called on the
/// per-request hot path; only at window closes.
pub trait RssProbe: Send {
    fn sample(&mut self) -> u64;
}

pub struct SysinfoRssProbe {
    system: System,
    pid: Pid,
}

impl SysinfoRssProbe {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().unwrap_or(Pid::from_u32(std::process::id()));
        SysinfoRssProbe {
            system: System::new_with_specifics(RefreshKind::nothing()),
            pid,
        }
    }
}

impl Default for SysinfoRssProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl RssProbe for SysinfoRssProbe {
    fn sample(&mut self) -> u64 {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            false,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system.process(self.pid).map(Process::memory).unwrap_or(0)
    }
}

/// A deterministic stand-in for tests that need reproducible result
/// documents; real RSS sampling is explicitly excluded from the
/// determinism guarantee.
#[derive(Default)]
pub struct StubRssProbe(pub u64);

impl RssProbe for StubRssProbe {
    fn sample(&mut self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stub_is_constant() {
        let mut p = StubRssProbe(1234);
        assert_eq!(p.sample(), 1234);
        assert_eq!(p.sample(), 1234);
    }
}
