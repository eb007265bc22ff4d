use std::time::{
    Duration,
    Instant,
};

pub const DEFAULT_NOTICE_DURATION: Duration = Duration::from_secs(4);
const MAX_NOTICES: usize = 5;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum NoticeLevel {
    #[default]
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug, Default)]
pub struct NoticeOptions {
    pub description: Option<String>,
    pub duration: Option<Duration>,
    pub level: NoticeLevel,
}

impl NoticeOptions {
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn level(mut self, level: NoticeLevel) -> Self {
        self.level = level;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

#[derive(Clone, Debug)]
pub struct Notice {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub level: NoticeLevel,
    pub duration: Duration,
    pub posted_at: Instant,
}

impl Notice {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.posted_at) >= self.duration
    }
}

/// Stack of transient notices, newest first.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    notices: Vec<Notice>,
    next_id: u64,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&mut self, title: impl Into<String>, options: NoticeOptions) -> u64 {
        let title = title.into();
        let description = options.description;
        match options.level {
            NoticeLevel::Error => {
                tracing::warn!(%title, description = ?description, "notice")
            }
            _ => tracing::info!(%title, description = ?description, "notice"),
        }
        let id = self.next_id;
        self.next_id += 1;
        self.notices.insert(
            0,
            Notice {
                id,
                title,
                description,
                level: options.level,
                duration: options.duration.unwrap_or(DEFAULT_NOTICE_DURATION),
                posted_at: Instant::now(),
            },
        );
        self.notices.truncate(MAX_NOTICES);
        id
    }

    /// Drops the newest notice. Returns whether anything was dismissed.
    pub fn dismiss_latest(&mut self) -> bool {
        if self.notices.is_empty() {
            return false;
        }
        self.notices.remove(0);
        true
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    /// Removes expired notices and reports whether the stack changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| !n.is_expired(now));
        self.notices.len() != before
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.notices.first()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}
