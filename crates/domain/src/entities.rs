use std::fmt;

use serde::{Deserialize, Serialize};

use crawler_core::CrawlerError;

/// 连续租约超时达到该次数后任务进入 Failed 状态
pub const FAIL_THRESHOLD: u32 = 5;

/// 新任务的默认优先级
pub const DEFAULT_PRIORITY: u32 = 1;

/// 爬取任务类型，线上格式为整数编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum JobType {
    /// 用户资料
    Profile,
    /// 用户发布的时间线
    Timeline,
    Unknown,
}

impl JobType {
    pub fn code(&self) -> i32 {
        match self {
            JobType::Profile => 0,
            JobType::Timeline => 1,
            JobType::Unknown => -1,
        }
    }

    pub fn is_known(&self) -> bool {
        match self {
            JobType::Profile | JobType::Timeline => true,
            JobType::Unknown => false,
        }
    }
}

impl TryFrom<i32> for JobType {
    type Error = CrawlerError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(JobType::Profile),
            1 => Ok(JobType::Timeline),
            -1 => Ok(JobType::Unknown),
            other => Err(CrawlerError::InvalidJobType(other)),
        }
    }
}

impl From<JobType> for i32 {
    fn from(job_type: JobType) -> Self {
        job_type.code()
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobType::Profile => write!(f, "profile"),
            JobType::Timeline => write!(f, "timeline"),
            JobType::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Pending,
    Fulfilled,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        match self {
            JobState::Fulfilled | JobState::Failed => true,
            JobState::Idle | JobState::Pending => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => write!(f, "idle"),
            JobState::Pending => write!(f, "pending"),
            JobState::Fulfilled => write!(f, "fulfilled"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// 任务唯一键：`<类型编码>-<外部ID>`
pub fn job_uid(job_type: JobType, id: &str) -> String {
    format!("{}-{}", job_type.code(), id)
}

/// 爬取任务
///
/// `uid` 在构造时计算，之后不可变；状态只能通过下列方法迁移：
///
/// ```text
/// Idle --mark_active--> Pending --mark_done--> Fulfilled
///                        Pending --reset_state--> Idle | Failed
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    id: String,
    #[serde(rename = "type")]
    job_type: JobType,
    uid: String,
    priority: u32,
    state: JobState,
    fail_count: u32,
}

impl Job {
    pub fn new(job_type: JobType, id: impl Into<String>) -> Self {
        Self::with_priority(job_type, id, DEFAULT_PRIORITY)
    }

    pub fn with_priority(job_type: JobType, id: impl Into<String>, priority: u32) -> Self {
        let id = id.into();
        let uid = job_uid(job_type, &id);
        Self {
            id,
            job_type,
            uid,
            priority,
            state: JobState::Idle,
            fail_count: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn fail_count(&self) -> u32 {
        self.fail_count
    }

    pub fn is_idle(&self) -> bool {
        self.state == JobState::Idle
    }

    pub fn is_pending(&self) -> bool {
        self.state == JobState::Pending
    }

    pub fn bump_priority(&mut self) {
        self.priority = self.priority.saturating_add(1);
    }

    /// 租约超时恢复：失败次数加一，达到阈值后进入 Failed，否则回到 Idle
    pub fn reset_state(&mut self) -> JobState {
        self.fail_count = self.fail_count.saturating_add(1);
        self.state = if self.fail_count >= FAIL_THRESHOLD {
            JobState::Failed
        } else {
            JobState::Idle
        };
        self.state
    }

    pub fn mark_active(&mut self) {
        self.state = JobState::Pending;
    }

    pub fn mark_done(&mut self) {
        self.state = JobState::Fulfilled;
    }

    /// ID相同即视为同一任务；`match_type` 为 true 时还要求类型一致
    pub fn equals(&self, other: &Job, match_type: bool) -> bool {
        self.id == other.id && (!match_type || self.job_type == other.job_type)
    }

    /// 当前任务优先级不高于 `other` 时返回 true
    pub fn compare(&self, other: &Job) -> bool {
        self.priority <= other.priority
    }

    pub fn descriptor(&self) -> JobDescriptor {
        JobDescriptor {
            job_type: self.job_type,
            id: self.id.clone(),
        }
    }
}

/// 下发给Worker的任务描述 `{type, id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub id: String,
}

impl JobDescriptor {
    pub fn uid(&self) -> String {
        job_uid(self.job_type, &self.id)
    }
}

/// Worker回传的任务结果
///
/// 除 `type`/`id`/`mentions` 外的字段原样作为记录持久化。
/// `mentions` 携带新发现的外部ID，用于生成后续任务。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedJobPayload {
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
    #[serde(flatten)]
    pub record: serde_json::Map<String, serde_json::Value>,
}

impl CompletedJobPayload {
    pub fn new(job_type: JobType, id: impl Into<String>) -> Self {
        Self {
            job_type,
            id: id.into(),
            mentions: Vec::new(),
            record: serde_json::Map::new(),
        }
    }

    pub fn uid(&self) -> String {
        job_uid(self.job_type, &self.id)
    }

    /// 持久化的文档内容
    pub fn to_document(&self) -> serde_json::Value {
        let mut document = self.record.clone();
        document.insert("type".to_string(), self.job_type.code().into());
        document.insert("id".to_string(), self.id.clone().into());
        if !self.mentions.is_empty() {
            document.insert("mentions".to_string(), self.mentions.clone().into());
        }
        serde_json::Value::Object(document)
    }
}
