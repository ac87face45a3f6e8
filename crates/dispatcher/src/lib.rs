//! 调度核心：任务队列、租约协议与租约计时器

pub mod lease_timer;
pub mod scheduler;

pub use lease_timer::{LeaseId, LeaseTimers};
pub use scheduler::{
    AdmissionReport, CompletionReport, JobScheduler, QueueSnapshot, SchedulerSettings,
};
