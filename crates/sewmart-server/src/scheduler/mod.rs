//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring marketplace reconciliation jobs. Job failures are logged
//! and never abort the scheduler; per-order failures never abort a
//! batch.

mod orders;
mod stocks;

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<sewmart_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_ozon_poll_job(&scheduler, pool.clone(), Arc::clone(&config)).await?;
    register_wb_poll_job(&scheduler, pool.clone(), Arc::clone(&config)).await?;
    register_stock_push_job(&scheduler, pool, config).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Every 10 minutes: reconcile Ozon FBS postings with local orders.
async fn register_ozon_poll_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<sewmart_core::AppConfig>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 */10 * * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);

        Box::pin(async move {
            tracing::info!("scheduler: starting ozon order poll");
            orders::run_ozon_poll(&pool, &config).await;
            tracing::info!("scheduler: ozon order poll complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Every 10 minutes: pull new WB orders and reconcile open ones.
async fn register_wb_poll_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<sewmart_core::AppConfig>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 */10 * * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);

        Box::pin(async move {
            tracing::info!("scheduler: starting wb order poll");
            orders::run_wb_poll(&pool, &config).await;
            tracing::info!("scheduler: wb order poll complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Hourly: push reconciled stock quantities to every api-enabled
/// integration.
async fn register_stock_push_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<sewmart_core::AppConfig>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 0 * * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);

        Box::pin(async move {
            tracing::info!("scheduler: starting stock push");
            stocks::run_stock_push(&pool, &config).await;
            tracing::info!("scheduler: stock push complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
