//! User-facing notices
//!
//! Discrete signals the core hands to the presentation layer in place of
//! toasts. Messages keep the wording of the mobile app.

use crate::error::{AppError, ValidationError};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Notice {
    RecordCreated,
    RecordUpdated,
    SettingsSaved,
    EmptyAddress,
    InvalidRate,
    LastCarpetRow,
    StorageWriteFailed,
}

impl Notice {
    pub fn kind(self) -> NoticeKind {
        match self {
            Notice::RecordCreated | Notice::RecordUpdated | Notice::SettingsSaved => {
                NoticeKind::Success
            }
            _ => NoticeKind::Error,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Notice::RecordCreated => "Запись создана",
            Notice::RecordUpdated => "Запись обновлена",
            Notice::SettingsSaved => "Настройки сохранены",
            Notice::EmptyAddress => "Адрес обязателен для заполнения",
            Notice::InvalidRate => "Введите корректный тариф",
            Notice::LastCarpetRow => "Должен остаться хотя бы один ковер",
            Notice::StorageWriteFailed => "Не удалось сохранить данные на устройстве",
        }
    }

    /// Notice for errors the user can correct; `None` for everything else
    pub fn from_error(err: &AppError) -> Option<Self> {
        match err {
            AppError::Validation(ValidationError::EmptyAddress) => Some(Notice::EmptyAddress),
            AppError::Validation(ValidationError::InvalidRate) => Some(Notice::InvalidRate),
            AppError::RowRemovalRejected => Some(Notice::LastCarpetRow),
            _ => None,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
