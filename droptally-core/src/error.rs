use strum::Display;
use thiserror::Error;

/// The submission kinds the pipeline materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SubmissionKind {
    Drop,
    #[strum(serialize = "personal_best")]
    PersonalBest,
    #[strum(serialize = "combat_achievement")]
    CombatAchievement,
    #[strum(serialize = "collection_log")]
    CollectionLog,
    Pet,
    AdventureLog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RefKind {
    Item,
    Npc,
}

/// The error taxonomy processors translate everything into. The transport
/// maps each variant onto its HTTP behavior.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("invalid submission: {0}")]
    Validation(String),

    #[error("player failed authentication")]
    AuthFailure,

    #[error("submission was already processed")]
    Duplicate,

    #[error("unknown {kind}: {name}")]
    UnknownReference { kind: RefKind, name: String },

    #[error("{item} is not a known drop from {npc}")]
    DropUnverified { item: String, npc: String },

    #[error("upstream service unavailable")]
    TransientUpstream(#[from] osrs_api::UpstreamError),

    #[error("insufficient points: need {required}, have {available}")]
    InsufficientPoints { required: i64, available: i64 },

    #[error("database error")]
    Database(#[from] diesel::result::Error),

    #[error("redis error")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    #[error("redis operation exceeded its time budget")]
    RedisTimeout,

    #[error("redis pool error")]
    RedisPool(#[from] deadpool_redis::PoolError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SubmissionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn unknown_item(name: impl Into<String>) -> Self {
        Self::UnknownReference {
            kind: RefKind::Item,
            name: name.into(),
        }
    }

    pub fn unknown_npc(name: impl Into<String>) -> Self {
        Self::UnknownReference {
            kind: RefKind::Npc,
            name: name.into(),
        }
    }
}

/// What a processor hands back on success. `notice` is the human-facing
/// string the plugin shows ("a message has been sent to ... for you").
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub kind: SubmissionKind,
    pub id: Option<i64>,
    pub notice: Option<String>,
}

impl SubmissionOutcome {
    pub fn new(kind: SubmissionKind, id: Option<i64>) -> Self {
        Self {
            kind,
            id,
            notice: None,
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }
}
