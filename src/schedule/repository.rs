use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use sqlx::MySqlPool;

use super::ScheduleError;
use crate::model::work_schedule::{WorkSchedule, WorkScheduleRow};

pub type Result<T> = std::result::Result<T, ScheduleError>;

pub(crate) const SCHEDULE_COLUMNS: &str = r#"
    id, name, department_id, start_time, end_time, grace_minutes, work_days,
    saturday_start_time, saturday_end_time, saturday_grace_minutes,
    latitude, longitude, location_radius_km, is_default, is_global
"#;

/// Read access to work schedules, injected into the attendance flow.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// The schedule attached to a department, if any.
    async fn department_schedule(&self, department_id: u64) -> Result<Option<WorkSchedule>>;

    /// The schedule flagged as the global default, if any.
    async fn global_default(&self) -> Result<Option<WorkSchedule>>;
}

/// Department schedule first, then the global default. Having neither is a
/// setup error; no schedule is ever invented.
pub async fn resolve_schedule<R>(repo: &R, department_id: Option<u64>) -> Result<WorkSchedule>
where
    R: ScheduleRepository + ?Sized,
{
    if let Some(id) = department_id {
        if let Some(schedule) = repo.department_schedule(id).await? {
            return Ok(schedule);
        }
    }

    repo.global_default()
        .await?
        .ok_or(ScheduleError::NotFound(department_id))
}

pub struct MySqlScheduleRepository {
    pool: MySqlPool,
}

impl MySqlScheduleRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_one(&self, sql: &str, department_id: Option<u64>) -> Result<Option<WorkSchedule>> {
        let mut query = sqlx::query_as::<_, WorkScheduleRow>(sql);
        if let Some(id) = department_id {
            query = query.bind(id);
        }

        query
            .fetch_optional(&self.pool)
            .await?
            .map(WorkSchedule::try_from)
            .transpose()
    }
}

#[async_trait]
impl ScheduleRepository for MySqlScheduleRepository {
    async fn department_schedule(&self, department_id: u64) -> Result<Option<WorkSchedule>> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM work_schedules WHERE department_id = ? ORDER BY id DESC LIMIT 1"
        );
        self.fetch_one(&sql, Some(department_id)).await
    }

    async fn global_default(&self) -> Result<Option<WorkSchedule>> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM work_schedules WHERE is_global = TRUE AND is_default = TRUE ORDER BY id DESC LIMIT 1"
        );
        self.fetch_one(&sql, None).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ScheduleKey {
    Department(u64),
    Global,
}

/// Keeps found schedules in memory for a while. Misses are not cached so a
/// newly created schedule is picked up right away.
///
/// `generation` moves on every invalidation; a load that started under an
/// older generation never leaves its result in the cache.
pub struct CachedScheduleRepository<R> {
    inner: R,
    cache: Cache<ScheduleKey, WorkSchedule>,
    generation: AtomicU64,
}

impl<R: ScheduleRepository> CachedScheduleRepository<R> {
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(1_000).time_to_live(ttl).build(),
            generation: AtomicU64::new(0),
        }
    }

    /// Called after any schedule is created, edited or deleted.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
    }

    async fn cached<F>(&self, key: ScheduleKey, load: F) -> Result<Option<WorkSchedule>>
    where
        F: std::future::Future<Output = Result<Option<WorkSchedule>>>,
    {
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(Some(hit));
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let loaded = load.await?;
        if let Some(schedule) = &loaded {
            if self.generation.load(Ordering::SeqCst) == generation {
                self.cache.insert(key, schedule.clone()).await;
                // An invalidation may have slipped in between the check and the insert.
                if self.generation.load(Ordering::SeqCst) != generation {
                    self.cache.invalidate(&key).await;
                }
            }
        }
        Ok(loaded)
    }
}

#[async_trait]
impl<R: ScheduleRepository> ScheduleRepository for CachedScheduleRepository<R> {
    async fn department_schedule(&self, department_id: u64) -> Result<Option<WorkSchedule>> {
        self.cached(
            ScheduleKey::Department(department_id),
            self.inner.department_schedule(department_id),
        )
        .await
    }

    async fn global_default(&self) -> Result<Option<WorkSchedule>> {
        self.cached(ScheduleKey::Global, self.inner.global_default()).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveTime;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};
    use tokio::sync::{Notify, Semaphore};

    pub(crate) fn schedule(id: u64, department_id: Option<u64>) -> WorkSchedule {
        WorkSchedule {
            id,
            name: format!("schedule-{id}"),
            department_id,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            grace_minutes: 10,
            work_days: vec![1, 2, 3, 4, 5, 6],
            saturday_start_time: None,
            saturday_end_time: None,
            saturday_grace_minutes: None,
            geofence: None,
            is_default: department_id.is_none(),
            is_global: department_id.is_none(),
        }
    }

    #[derive(Default)]
    pub(crate) struct InMemorySchedules {
        pub by_department: Mutex<HashMap<u64, WorkSchedule>>,
        pub global: Mutex<Option<WorkSchedule>>,
        pub lookups: AtomicUsize,
    }

    #[async_trait]
    impl ScheduleRepository for InMemorySchedules {
        async fn department_schedule(&self, department_id: u64) -> Result<Option<WorkSchedule>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.by_department.lock().unwrap().get(&department_id).cloned())
        }

        async fn global_default(&self) -> Result<Option<WorkSchedule>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.global.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn department_schedule_wins_over_global() {
        let repo = InMemorySchedules::default();
        repo.by_department.lock().unwrap().insert(4, schedule(2, Some(4)));
        *repo.global.lock().unwrap() = Some(schedule(1, None));

        assert_eq!(resolve_schedule(&repo, Some(4)).await.unwrap().id, 2);
        assert_eq!(resolve_schedule(&repo, Some(5)).await.unwrap().id, 1);
        assert_eq!(resolve_schedule(&repo, None).await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn missing_schedule_is_an_error() {
        let repo = InMemorySchedules::default();
        let err = resolve_schedule(&repo, Some(9)).await.unwrap_err();
        assert!(matches!(err, ScheduleError::NotFound(Some(9))));
    }

    #[tokio::test]
    async fn works_through_a_trait_object() {
        let repo = InMemorySchedules::default();
        *repo.global.lock().unwrap() = Some(schedule(1, None));
        let dyn_repo: &dyn ScheduleRepository = &repo;
        assert_eq!(resolve_schedule(dyn_repo, Some(1)).await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn cache_serves_hits_until_invalidated() {
        let inner = InMemorySchedules::default();
        inner.by_department.lock().unwrap().insert(4, schedule(2, Some(4)));
        let cached = CachedScheduleRepository::new(inner, Duration::from_secs(60));

        resolve_schedule(&cached, Some(4)).await.unwrap();
        resolve_schedule(&cached, Some(4)).await.unwrap();
        assert_eq!(cached.inner.lookups.load(Ordering::SeqCst), 1);

        cached
            .inner
            .by_department
            .lock()
            .unwrap()
            .insert(4, schedule(3, Some(4)));
        cached.invalidate();
        assert_eq!(resolve_schedule(&cached, Some(4)).await.unwrap().id, 3);
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let inner = InMemorySchedules::default();
        let cached = CachedScheduleRepository::new(inner, Duration::from_secs(60));
        assert!(resolve_schedule(&cached, None).await.is_err());

        *cached.inner.global.lock().unwrap() = Some(schedule(1, None));
        assert_eq!(resolve_schedule(&cached, None).await.unwrap().id, 1);
    }

    /// Reads the schedule, then holds the answer until the test lets it go.
    struct GatedSchedules {
        schedules: InMemorySchedules,
        entered: Notify,
        gate: Semaphore,
    }

    impl GatedSchedules {
        fn new() -> Self {
            Self {
                schedules: InMemorySchedules::default(),
                entered: Notify::new(),
                gate: Semaphore::new(0),
            }
        }

        async fn hold<T>(&self, found: T) -> T {
            self.entered.notify_one();
            self.gate.acquire().await.unwrap().forget();
            found
        }
    }

    #[async_trait]
    impl ScheduleRepository for GatedSchedules {
        async fn department_schedule(&self, department_id: u64) -> Result<Option<WorkSchedule>> {
            let found = self.schedules.department_schedule(department_id).await?;
            Ok(self.hold(found).await)
        }

        async fn global_default(&self) -> Result<Option<WorkSchedule>> {
            let found = self.schedules.global_default().await?;
            Ok(self.hold(found).await)
        }
    }

    #[tokio::test]
    async fn edit_during_a_lookup_is_not_overwritten_by_it() {
        let inner = GatedSchedules::new();
        inner.schedules.by_department.lock().unwrap().insert(4, schedule(1, Some(4)));
        let cached = Arc::new(CachedScheduleRepository::new(inner, Duration::from_secs(300)));

        let in_flight = {
            let cached = cached.clone();
            tokio::spawn(async move { resolve_schedule(&*cached, Some(4)).await.map(|s| s.id) })
        };
        cached.inner.entered.notified().await;

        cached
            .inner
            .schedules
            .by_department
            .lock()
            .unwrap()
            .insert(4, schedule(2, Some(4)));
        cached.invalidate();
        cached.inner.gate.add_permits(1);

        // The lookup that was already running still answers with what it read.
        assert_eq!(in_flight.await.unwrap().unwrap(), 1);

        cached.inner.gate.add_permits(10);
        assert_eq!(resolve_schedule(&*cached, Some(4)).await.unwrap().id, 2);
    }
}
