//! User-visible notices emitted by stock operations.
//!
//! Notices are an observability signal for the person who triggered the
//! action. Every notice is also written to the tracing log.

use std::sync::Mutex;

use serde::Serialize;

pub const RECORD_UPDATED: &str = "record-updated-correctly";
pub const RECORD_NOT_FOUND: &str = "record-not-found";
pub const RECORD_SAVE_ERROR: &str = "record-save-error";
pub const NOT_ALLOWED_MODIFY: &str = "not-allowed-modify";
pub const INVALID_VALUE: &str = "invalid-value";
pub const INVALID_FORM_TOKEN: &str = "invalid-form-token";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Notice,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub code: String,
}

impl Notice {
    pub fn notice(code: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Notice,
            code: code.into(),
        }
    }

    pub fn warning(code: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            code: code.into(),
        }
    }
}

/// Destination for notices.
pub trait NoticeSink: Send + Sync {
    fn emit(&self, notice: Notice);
}

/// Drops every notice (tracing output only).
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardNotices;

impl NoticeSink for DiscardNotices {
    fn emit(&self, notice: Notice) {
        tracing::debug!(code = %notice.code, level = ?notice.level, "notice discarded");
    }
}

/// Collects notices for one request.
#[derive(Debug, Default)]
pub struct NoticeLog {
    inner: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notice> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn into_notices(self) -> Vec<Notice> {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl NoticeSink for NoticeLog {
    fn emit(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Notice => tracing::info!(code = %notice.code, "notice"),
            NoticeLevel::Warning => tracing::warn!(code = %notice.code, "warning notice"),
        }
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).push(notice);
    }
}
