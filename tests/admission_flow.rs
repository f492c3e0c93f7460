// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 准入管线集成测试
//!
//! 用内存实现替换数据库/Redis/系统DNS，验证两级去重、
//! 并发合流和入队失败回滚的端到端行为。

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

use scanrs::application::usecases::submit_scan::{Admission, SubmitError, SubmitScanUseCase};
use scanrs::domain::models::queue_job::{DeadLetterJob, QueueJob};
use scanrs::domain::models::scan_job::{ScanJob, ScanStatus};
use scanrs::domain::models::scan_report::ScanReport;
use scanrs::domain::repositories::queue_job_repository::QueueDepth;
use scanrs::domain::repositories::scan_job_repository::{
    Page, RepositoryError, ScanJobFilter, ScanJobRepository,
};
use scanrs::infrastructure::cache::dedup::{inflight_key, InFlightLock, MemoryInFlightLock};
use scanrs::infrastructure::metrics::ProcessMetrics;
use scanrs::queue::scan_queue::{QueueError, ScanQueue};
use scanrs::utils::errors::AdmissionError;
use scanrs::utils::ssrf::HostResolver;

mockall::mock! {
    Resolver {}

    #[async_trait]
    impl HostResolver for Resolver {
        async fn resolve(&self, hostname: &str) -> Result<IpAddr, AdmissionError>;
    }
}

/// 解析到固定公网地址
fn public_resolver() -> Arc<dyn HostResolver> {
    resolver_returning(Ok("93.184.216.34".parse().unwrap()))
}

fn resolver_returning(result: Result<IpAddr, AdmissionError>) -> Arc<dyn HostResolver> {
    let mut mock = MockResolver::new();
    mock.expect_resolve().returning(move |_| result.clone());
    Arc::new(mock)
}

/// 内存任务仓库
#[derive(Default)]
struct FakeJobs {
    jobs: Mutex<HashMap<Uuid, ScanJob>>,
}

impl FakeJobs {
    fn insert(&self, job: ScanJob) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }
}

#[async_trait]
impl ScanJobRepository for FakeJobs {
    async fn create(&self, job: &ScanJob) -> Result<ScanJob, RepositoryError> {
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(job.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScanJob>, RepositoryError> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn find_recent_success(
        &self,
        url: &str,
        since: DateTime<FixedOffset>,
    ) -> Result<Option<ScanJob>, RepositoryError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| {
                j.target_url == url
                    && j.status == ScanStatus::Success
                    && j.completed_at.map(|t| t >= since).unwrap_or(false)
            })
            .max_by_key(|j| j.completed_at)
            .cloned())
    }

    async fn find_active(&self, url: &str) -> Result<Option<ScanJob>, RepositoryError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .find(|j| {
                j.target_url == url
                    && matches!(j.status, ScanStatus::Pending | ScanStatus::Running)
            })
            .cloned())
    }

    async fn mark_running(&self, id: Uuid) -> Result<ScanJob, RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get(&id).cloned().ok_or(RepositoryError::NotFound)?;
        let running = job
            .start()
            .map_err(|e| RepositoryError::InvalidState(e.to_string()))?;
        jobs.insert(id, running.clone());
        Ok(running)
    }

    async fn complete_with_report(
        &self,
        job_id: Uuid,
        _report: &ScanReport,
    ) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get(&job_id).cloned().ok_or(RepositoryError::NotFound)?;
        let done = job
            .complete()
            .map_err(|e| RepositoryError::InvalidState(e.to_string()))?;
        jobs.insert(job_id, done);
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get(&id).cloned().ok_or(RepositoryError::NotFound)?;
        let failed = job
            .fail(error)
            .map_err(|e| RepositoryError::InvalidState(e.to_string()))?;
        jobs.insert(id, failed);
        Ok(())
    }

    async fn list(
        &self,
        _filter: ScanJobFilter,
        page: u64,
        limit: u64,
    ) -> Result<Page<ScanJob>, RepositoryError> {
        let jobs: Vec<ScanJob> = self.jobs.lock().unwrap().values().cloned().collect();
        let total = jobs.len() as u64;
        Ok(Page::new(jobs, page, limit, total))
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get(&id) {
            None => Err(RepositoryError::NotFound),
            Some(job) if job.status == ScanStatus::Running => Err(RepositoryError::Conflict(
                "cannot delete a running scan".to_string(),
            )),
            Some(_) => {
                jobs.remove(&id);
                Ok(())
            }
        }
    }
}

/// 内存队列
#[derive(Default)]
struct FakeQueue {
    enqueued: Mutex<Vec<QueueJob>>,
    enqueue_count: AtomicUsize,
    fail_enqueue: bool,
}

#[async_trait]
impl ScanQueue for FakeQueue {
    async fn enqueue(&self, job: QueueJob) -> Result<QueueJob, QueueError> {
        if self.fail_enqueue {
            return Err(QueueError::Repository(RepositoryError::Database(
                sea_orm::DbErr::Custom("queue backend down".to_string()),
            )));
        }
        self.enqueue_count.fetch_add(1, Ordering::SeqCst);
        self.enqueued.lock().unwrap().push(job.clone());
        Ok(job)
    }

    async fn dequeue(&self, _worker_id: Uuid) -> Result<Option<QueueJob>, QueueError> {
        Ok(self.enqueued.lock().unwrap().pop())
    }

    async fn renew_lease(&self, _job_id: Uuid, _worker_id: Uuid) -> Result<bool, QueueError> {
        Ok(true)
    }

    async fn complete(&self, _job_id: Uuid) -> Result<(), QueueError> {
        Ok(())
    }

    async fn release_for_retry(
        &self,
        _job_id: Uuid,
        _next_attempt_at: DateTime<FixedOffset>,
    ) -> Result<(), QueueError> {
        Ok(())
    }

    async fn dead_letter(
        &self,
        _job_id: Uuid,
        _record: &DeadLetterJob,
    ) -> Result<(), QueueError> {
        Ok(())
    }

    async fn depth(&self) -> Result<QueueDepth, QueueError> {
        Ok(QueueDepth::default())
    }
}

type TestUseCase = SubmitScanUseCase<FakeJobs, FakeQueue>;

fn build_use_case(
    jobs: Arc<FakeJobs>,
    queue: Arc<FakeQueue>,
    lock: Arc<MemoryInFlightLock>,
    resolver: Arc<dyn HostResolver>,
) -> TestUseCase {
    SubmitScanUseCase::new(jobs, queue, lock, resolver, Arc::new(ProcessMetrics::new()))
}

#[tokio::test]
async fn gibberish_is_rejected_with_domain_notice() {
    let use_case = build_use_case(
        Arc::new(FakeJobs::default()),
        Arc::new(FakeQueue::default()),
        Arc::new(MemoryInFlightLock::new()),
        public_resolver(),
    );

    let result = use_case.execute("ksgdsgfksdgfksdfg", None).await;
    match result {
        Err(SubmitError::Rejected(e)) => {
            assert_eq!(e.code(), "URL_NO_TLD");
            assert!(e.client_message().contains("doesn't look like a real domain"));
        }
        other => panic!("expected rejection, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn raw_ip_is_rejected_before_resolution() {
    let use_case = build_use_case(
        Arc::new(FakeJobs::default()),
        Arc::new(FakeQueue::default()),
        Arc::new(MemoryInFlightLock::new()),
        public_resolver(),
    );

    let result = use_case.execute("http://127.0.0.1/", None).await;
    match result {
        Err(SubmitError::Rejected(e)) => {
            assert_eq!(e.code(), "URL_RAW_IP");
            assert!(e.client_message().contains("not supported"));
        }
        other => panic!("expected rejection, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn unresolvable_domain_is_rejected_with_dns_notice() {
    let use_case = build_use_case(
        Arc::new(FakeJobs::default()),
        Arc::new(FakeQueue::default()),
        Arc::new(MemoryInFlightLock::new()),
        resolver_returning(Err(AdmissionError::DnsFailed("NOT_FOUND".to_string()))),
    );

    let result = use_case.execute("example.invalid", None).await;
    match result {
        Err(SubmitError::Rejected(e)) => {
            assert!(e.code().starts_with("DNS_FAILED"));
            assert!(e.client_message().contains("resolve"));
        }
        other => panic!("expected rejection, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn rebinding_to_private_address_is_blocked() {
    // 域名表面无害，解析到内网地址
    let use_case = build_use_case(
        Arc::new(FakeJobs::default()),
        Arc::new(FakeQueue::default()),
        Arc::new(MemoryInFlightLock::new()),
        resolver_returning(Ok("10.1.2.3".parse().unwrap())),
    );

    let result = use_case.execute("https://innocent.example.com", None).await;
    match result {
        Err(SubmitError::Rejected(e)) => {
            assert_eq!(e.code(), "SSRF_PRIVATE_IP");
            assert!(e.client_message().contains("not permitted"));
        }
        other => panic!("expected rejection, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn reserved_hostname_is_blocked_after_any_resolution() {
    let use_case = build_use_case(
        Arc::new(FakeJobs::default()),
        Arc::new(FakeQueue::default()),
        Arc::new(MemoryInFlightLock::new()),
        public_resolver(),
    );

    let result = use_case.execute("metadata.google.internal", None).await;
    match result {
        Err(SubmitError::Rejected(e)) => {
            assert!(e.code().starts_with("SSRF_"));
        }
        other => panic!("expected rejection, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn recent_success_is_served_from_cache() {
    let jobs = Arc::new(FakeJobs::default());
    let queue = Arc::new(FakeQueue::default());

    // 预置一条窗口内完成的SUCCESS任务
    let prior = ScanJob::new("https://example.com/".to_string(), None)
        .start()
        .unwrap()
        .complete()
        .unwrap();
    let prior_id = prior.id;
    jobs.insert(prior);

    let use_case = build_use_case(
        jobs,
        queue.clone(),
        Arc::new(MemoryInFlightLock::new()),
        public_resolver(),
    );

    match use_case.execute("https://example.com", None).await.unwrap() {
        Admission::Cached(job) => {
            assert_eq!(job.id, prior_id);
            assert_eq!(job.status, ScanStatus::Success);
        }
        other => panic!("expected cache hit, got {:?}", other),
    }

    // 缓存命中不产生新队列任务
    assert_eq!(queue.enqueue_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stale_success_is_not_served_from_cache() {
    let jobs = Arc::new(FakeJobs::default());
    let queue = Arc::new(FakeQueue::default());

    // 窗口外的SUCCESS任务不构成缓存
    let mut prior = ScanJob::new("https://example.com/".to_string(), None)
        .start()
        .unwrap()
        .complete()
        .unwrap();
    prior.completed_at = Some((Utc::now() - chrono::Duration::minutes(30)).into());
    jobs.insert(prior);

    let use_case = build_use_case(
        jobs,
        queue.clone(),
        Arc::new(MemoryInFlightLock::new()),
        public_resolver(),
    );

    match use_case.execute("https://example.com", None).await.unwrap() {
        Admission::Accepted(_) => {}
        other => panic!("expected fresh admission, got {:?}", other),
    }
    assert_eq!(queue.enqueue_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_submissions_enqueue_exactly_once() {
    let jobs = Arc::new(FakeJobs::default());
    let queue = Arc::new(FakeQueue::default());
    let use_case = Arc::new(build_use_case(
        jobs,
        queue.clone(),
        Arc::new(MemoryInFlightLock::new()),
        public_resolver(),
    ));

    let mut handles = Vec::new();
    for _ in 0..25 {
        let use_case = use_case.clone();
        handles.push(tokio::spawn(async move {
            use_case.execute("https://example.com", None).await
        }));
    }

    let mut job_ids = Vec::new();
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            Admission::Accepted(job) | Admission::InFlight(job) => job_ids.push(job.id),
            Admission::Cached(_) => panic!("no success existed, cache hit impossible"),
        }
    }

    // 恰好一次入队，所有响应指向同一个任务
    assert_eq!(queue.enqueue_count.load(Ordering::SeqCst), 1);
    let first = job_ids[0];
    assert!(job_ids.iter().all(|id| *id == first));
}

#[tokio::test]
async fn enqueue_failure_marks_job_failed_and_releases_lock() {
    let jobs = Arc::new(FakeJobs::default());
    let queue = Arc::new(FakeQueue {
        fail_enqueue: true,
        ..Default::default()
    });
    let lock = Arc::new(MemoryInFlightLock::new());

    let use_case = build_use_case(jobs.clone(), queue, lock.clone(), public_resolver());

    let result = use_case.execute("https://example.com", None).await;
    assert!(matches!(result, Err(SubmitError::Internal(_))));

    // 任务留档为FAILED，错误信息固定
    let failed: Vec<ScanJob> = jobs
        .jobs
        .lock()
        .unwrap()
        .values()
        .cloned()
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status, ScanStatus::Failed);
    assert_eq!(
        failed[0].error_message.as_deref(),
        Some("Failed to enqueue scan job")
    );

    // 在途键已释放，后续提交可重新获取
    let key = inflight_key("https://example.com/");
    assert!(lock
        .try_acquire(&key, "probe", std::time::Duration::from_secs(600))
        .await
        .unwrap());
}

#[tokio::test]
async fn second_submission_coalesces_onto_pending_job() {
    let jobs = Arc::new(FakeJobs::default());
    let queue = Arc::new(FakeQueue::default());
    let use_case = build_use_case(
        jobs,
        queue.clone(),
        Arc::new(MemoryInFlightLock::new()),
        public_resolver(),
    );

    let first = match use_case.execute("https://example.com", None).await.unwrap() {
        Admission::Accepted(job) => job,
        other => panic!("expected acceptance, got {:?}", other),
    };

    let second = match use_case.execute("https://example.com", None).await.unwrap() {
        Admission::InFlight(job) => job,
        other => panic!("expected coalescing, got {:?}", other),
    };

    assert_eq!(first.id, second.id);
    assert!(matches!(
        second.status,
        ScanStatus::Pending | ScanStatus::Running
    ));
    assert_eq!(queue.enqueue_count.load(Ordering::SeqCst), 1);
}
