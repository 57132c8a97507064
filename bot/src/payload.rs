//! Invoice payload carried through an in-chat Stars payment:
//! `stars:<bot_id>:<plan_id>:<user_id>`.

use std::{fmt, str::FromStr};

use thiserror::Error;

pub const STARS_KIND: &str = "stars";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarsPayload {
    pub bot_id: i64,
    pub plan_id: i64,
    pub user_id: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("expected 4 fields, got {0}")]
    FieldCount(usize),
    #[error("unsupported payload kind `{0}`")]
    Kind(String),
    #[error("invalid {0}")]
    Number(&'static str),
}

impl FromStr for StarsPayload {
    type Err = PayloadError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = raw.split(':').collect();
        let &[kind, bot_id, plan_id, user_id] = fields.as_slice() else {
            return Err(PayloadError::FieldCount(fields.len()));
        };
        if kind != STARS_KIND {
            return Err(PayloadError::Kind(kind.to_string()));
        }
        Ok(StarsPayload {
            bot_id: bot_id.parse().map_err(|_| PayloadError::Number("bot id"))?,
            plan_id: plan_id.parse().map_err(|_| PayloadError::Number("plan id"))?,
            user_id: user_id.parse().map_err(|_| PayloadError::Number("user id"))?,
        })
    }
}

impl fmt::Display for StarsPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            STARS_KIND, self.bot_id, self.plan_id, self.user_id
        )
    }
}
