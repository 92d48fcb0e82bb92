use std::future::Future;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Waits for `stop` while watching the pipeline tasks, then cancels and
/// joins them.
///
/// Each task resolves to its pipeline name. A task that ends before `stop`
/// (panic or unexpected return) is reported as soon as it ends; the
/// remaining pipelines keep running. Returns early once every task is gone.
pub async fn supervise<S>(mut tasks: JoinSet<&'static str>, shutdown: CancellationToken, stop: S)
where
    S: Future<Output = ()>,
{
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => {
                info!("Shutdown signal received");
                break;
            }
            joined = tasks.join_next() => match joined {
                Some(res) => report_exit(res, shutdown.is_cancelled()),
                None => {
                    warn!("all pipelines exited; stopping");
                    return;
                }
            },
        }
    }

    shutdown.cancel();
    while let Some(res) = tasks.join_next().await {
        report_exit(res, true);
    }
}

fn report_exit(res: Result<&'static str, JoinError>, expected: bool) {
    match res {
        Ok(pipeline) if expected => debug!(pipeline, "pipeline joined"),
        Ok(pipeline) => error!(pipeline, "pipeline exited before shutdown"),
        Err(e) => error!(error = %e, "pipeline task panicked"),
    }
}
