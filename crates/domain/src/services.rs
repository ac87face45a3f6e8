//! # 队列领域服务
//!
//! 针对任务集合的纯函数：排序、筛选与查找。
//! 这些函数不持有状态，由调度器在持锁期间调用。
//!
//! ## 排序规则
//!
//! - 优先级高的任务排在前面
//! - 优先级相同时保持原有相对顺序（稳定排序）
//!
//! ```rust
//! use crawler_domain::{sort_jobs, Job, JobType};
//!
//! let jobs = vec![
//!     Job::with_priority(JobType::Profile, "a", 1),
//!     Job::with_priority(JobType::Profile, "b", 3),
//! ];
//! let sorted = sort_jobs(jobs);
//! assert_eq!(sorted[0].id(), "b");
//! ```

use std::cmp::Ordering;

use crate::entities::Job;

/// 按优先级降序比较，`a` 优先级更高时返回 `Ordering::Less`
pub fn compare_jobs(a: &Job, b: &Job) -> Ordering {
    b.priority().cmp(&a.priority())
}

/// 返回按优先级降序、同级保持插入顺序的任务列表
pub fn sort_jobs(mut jobs: Vec<Job>) -> Vec<Job> {
    jobs.sort_by(compare_jobs);
    jobs
}

/// 筛选可租约任务；`include_pending` 为 true 时同时返回 Pending 任务
pub fn filter_idle(jobs: &[Job], include_pending: bool) -> Vec<&Job> {
    jobs.iter()
        .filter(|job| job.is_idle() || (include_pending && job.is_pending()))
        .collect()
}

/// 在队列中查找目标任务
///
/// `match_type` 为 true 时按 uid 精确匹配，否则任意类型的同ID任务都算命中。
pub fn find_job<'a>(target: &Job, jobs: &'a [Job], match_type: bool) -> Option<&'a Job> {
    jobs.iter().find(|job| job.equals(target, match_type))
}

pub fn find_job_mut<'a>(
    target: &Job,
    jobs: &'a mut [Job],
    match_type: bool,
) -> Option<&'a mut Job> {
    jobs.iter_mut().find(|job| job.equals(target, match_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{JobState, JobType};

    fn queue_with_priorities(priorities: &[u32]) -> Vec<Job> {
        priorities
            .iter()
            .enumerate()
            .map(|(i, p)| Job::with_priority(JobType::Timeline, format!("{i}"), *p))
            .collect()
    }

    #[test]
    fn test_sort_jobs_descending() {
        let jobs = queue_with_priorities(&[0, 1, 2, 3, 4, 5]);
        let sorted = sort_jobs(jobs);

        let priorities: Vec<u32> = sorted.iter().map(|j| j.priority()).collect();
        assert_eq!(priorities, vec![5, 4, 3, 2, 1, 0]);
        for pair in sorted.windows(2) {
            assert!(pair[0].priority() >= pair[1].priority());
        }
    }

    #[test]
    fn test_sort_jobs_is_stable() {
        let jobs = vec![
            Job::with_priority(JobType::Profile, "first", 2),
            Job::with_priority(JobType::Profile, "low", 1),
            Job::with_priority(JobType::Profile, "second", 2),
            Job::with_priority(JobType::Profile, "third", 2),
        ];
        let sorted = sort_jobs(jobs);
        let ids: Vec<&str> = sorted.iter().map(|j| j.id()).collect();
        assert_eq!(ids, vec!["first", "second", "third", "low"]);
    }

    #[test]
    fn test_compare_jobs_orders_higher_priority_first() {
        let high = Job::with_priority(JobType::Profile, "a", 3);
        let low = Job::with_priority(JobType::Profile, "b", 1);
        assert_eq!(compare_jobs(&high, &low), Ordering::Less);
        assert_eq!(compare_jobs(&low, &high), Ordering::Greater);
        assert_eq!(compare_jobs(&low, &low), Ordering::Equal);
    }

    #[test]
    fn test_filter_idle() {
        let mut jobs = queue_with_priorities(&[1, 1, 1, 1]);
        jobs[1].mark_active();
        jobs[2].mark_done();
        for _ in 0..crate::entities::FAIL_THRESHOLD {
            jobs[3].reset_state();
        }
        assert_eq!(jobs[3].state(), JobState::Failed);

        let idle = filter_idle(&jobs, false);
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].id(), "0");

        let with_pending = filter_idle(&jobs, true);
        let ids: Vec<&str> = with_pending.iter().map(|j| j.id()).collect();
        assert_eq!(ids, vec!["0", "1"]);
    }

    #[test]
    fn test_filter_and_sort_mixed_states() {
        let mut jobs = queue_with_priorities(&[0, 1, 2, 3, 4, 5]);
        jobs[0].mark_active();
        jobs[5].mark_done();

        let idle = filter_idle(&jobs, false);
        assert_eq!(idle.len(), 4);
        let idle_priorities: Vec<u32> = idle.iter().map(|j| j.priority()).collect();
        assert_eq!(idle_priorities, vec![1, 2, 3, 4]);

        let sorted = sort_jobs(jobs);
        assert_eq!(sorted[0].priority(), 5);
        assert_eq!(sorted[0].state(), JobState::Fulfilled);
        assert_eq!(sorted[5].priority(), 0);
        assert_eq!(sorted[5].state(), JobState::Pending);
    }

    #[test]
    fn test_filter_idle_empty_queue() {
        assert!(filter_idle(&[], true).is_empty());
    }

    #[test]
    fn test_find_job_by_uid_or_id() {
        let jobs = vec![
            Job::new(JobType::Profile, "123"),
            Job::new(JobType::Timeline, "456"),
        ];

        let timeline_123 = Job::new(JobType::Timeline, "123");
        assert!(find_job(&timeline_123, &jobs, true).is_none());
        let found = find_job(&timeline_123, &jobs, false).unwrap();
        assert_eq!(found.uid(), "0-123");

        let timeline_456 = Job::new(JobType::Timeline, "456");
        assert_eq!(
            find_job(&timeline_456, &jobs, true).map(|j| j.uid()),
            Some("1-456")
        );
        assert!(find_job(&Job::new(JobType::Profile, "789"), &jobs, false).is_none());
    }

    #[test]
    fn test_find_job_mut_updates_in_place() {
        let mut jobs = vec![Job::new(JobType::Profile, "123")];
        let target = Job::new(JobType::Profile, "123");

        if let Some(job) = find_job_mut(&target, &mut jobs, true) {
            job.bump_priority();
        }
        assert_eq!(jobs[0].priority(), 2);
    }
}
