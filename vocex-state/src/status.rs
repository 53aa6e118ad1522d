//! Holds a thread safe status implementation.

use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Status of a service or sync routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum StatusType {
    /// Running initial startup routine.
    Spawning = 0,
    /// Catching up with the upstream services.
    Syncing = 1,
    /// In sync and waiting for new data.
    Ready = 2,
    /// Running a tick.
    Busy = 3,
    /// Shutting down.
    Closing = 4,
    /// Not running.
    Offline = 5,
    /// A failure the routine keeps retrying through.
    RecoverableError = 6,
    /// A failure that stopped the routine.
    CriticalError = 7,
}

impl From<usize> for StatusType {
    fn from(value: usize) -> Self {
        match value {
            0 => StatusType::Spawning,
            1 => StatusType::Syncing,
            2 => StatusType::Ready,
            3 => StatusType::Busy,
            4 => StatusType::Closing,
            5 => StatusType::Offline,
            6 => StatusType::RecoverableError,
            _ => StatusType::CriticalError,
        }
    }
}

impl From<StatusType> for usize {
    fn from(status: StatusType) -> Self {
        status as usize
    }
}

impl fmt::Display for StatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            StatusType::Spawning => "Spawning",
            StatusType::Syncing => "Syncing",
            StatusType::Ready => "Ready",
            StatusType::Busy => "Busy",
            StatusType::Closing => "Closing",
            StatusType::Offline => "Offline",
            StatusType::RecoverableError => "RecoverableError",
            StatusType::CriticalError => "CriticalError",
        };
        write!(f, "{status_str}")
    }
}

impl StatusType {
    /// Returns the status symbol used in status log lines.
    pub fn get_status_symbol(&self) -> String {
        let (symbol, color_code) = match self {
            StatusType::Ready => ("🟢", "\x1b[32m"),
            StatusType::Syncing | StatusType::Busy | StatusType::Spawning => ("🟡", "\x1b[33m"),
            StatusType::Closing | StatusType::Offline => ("⚫", "\x1b[90m"),
            StatusType::RecoverableError => ("🟠", "\x1b[38;5;208m"),
            StatusType::CriticalError => ("🔴", "\x1b[31m"),
        };
        format!("{color_code}{symbol}\x1b[0m")
    }

    /// Combines two statuses, keeping the more severe one.
    ///
    /// Errors dominate, then shutdown states, then activity.
    pub fn combine(self, other: StatusType) -> StatusType {
        fn rank(status: StatusType) -> u8 {
            match status {
                StatusType::Ready => 0,
                StatusType::Busy => 1,
                StatusType::Syncing => 2,
                StatusType::Spawning => 3,
                StatusType::Closing => 4,
                StatusType::Offline => 5,
                StatusType::RecoverableError => 6,
                StatusType::CriticalError => 7,
            }
        }
        if rank(self) >= rank(other) {
            self
        } else {
            other
        }
    }
}

/// Holds a thread safe representation of a [`StatusType`].
#[derive(Debug, Clone)]
pub struct AtomicStatus {
    inner: Arc<AtomicUsize>,
}

impl AtomicStatus {
    /// Creates a new AtomicStatus.
    pub fn new(status: StatusType) -> Self {
        Self {
            inner: Arc::new(AtomicUsize::new(status.into())),
        }
    }

    /// Loads the value held in the AtomicStatus.
    pub fn load(&self) -> StatusType {
        StatusType::from(self.inner.load(Ordering::SeqCst))
    }

    /// Sets the value held in the AtomicStatus.
    pub fn store(&self, status: StatusType) {
        self.inner.store(status.into(), Ordering::SeqCst);
    }
}
