use std::{any::Any, future::Future, panic::AssertUnwindSafe, path::Path, sync::Arc};

use futures_util::FutureExt;
use reqwest::Client;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::{
    errors::{ParcelError, Result},
    event::{Event, Events},
    fetcher::fetch_segment,
    layout::part_file_path,
    segment::{Segment, SegmentState},
};

/// Runs one fetcher per segment concurrently and waits for all of them.
///
/// The first failure aborts the workers that are still running, but this
/// function only returns once every worker has stopped, so no part file is
/// still being written when the caller looks at the parts directory. On
/// success the returned states are indexed by segment and are all
/// `Done` or `Degenerate`.
pub async fn fan_out(
    client: &Client,
    url: &str,
    segments: &[Segment],
    output_path: &Path,
    events: &Events,
) -> Result<Vec<SegmentState>> {
    let url: Arc<str> = Arc::from(url);
    run_workers(segments, events, |segment| {
        let client = client.clone();
        let url = url.clone();
        let part_path = part_file_path(output_path, segment.index);
        let events = events.clone();
        async move { fetch_segment(&client, &url, segment, &part_path, &events).await }
    })
    .await
}

async fn run_workers<F, Fut>(
    segments: &[Segment],
    events: &Events,
    mut worker: F,
) -> Result<Vec<SegmentState>>
where
    F: FnMut(Segment) -> Fut,
    Fut: Future<Output = Result<u64>> + Send + 'static,
{
    let mut states: Vec<SegmentState> = segments.iter().map(Segment::initial_state).collect();
    let mut workers = JoinSet::new();

    for segment in segments.iter().copied() {
        if states[segment.index] == SegmentState::Pending {
            states[segment.index] = SegmentState::Fetching;
        }
        let fetch = AssertUnwindSafe(worker(segment)).catch_unwind();
        workers.spawn(async move {
            let result = fetch.await.unwrap_or_else(|panic| {
                Err(ParcelError::Worker {
                    index: segment.index,
                    message: panic_message(&*panic),
                })
            });
            (segment, result)
        });
    }

    let mut failure: Option<ParcelError> = None;

    while let Some(joined) = workers.join_next().await {
        // Panics are caught inside the task, so only aborted workers land here.
        let (segment, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(error = %e, "segment worker cancelled");
                continue;
            }
        };

        let state = match result {
            Ok(_) if segment.is_degenerate() => SegmentState::Degenerate,
            Ok(bytes) => SegmentState::Done { bytes },
            Err(e) => {
                warn!(
                    segment = segment.index,
                    error = %e,
                    "segment failed, aborting remaining workers"
                );
                let state = SegmentState::Failed {
                    reason: e.to_string(),
                };
                if failure.is_none() {
                    failure = Some(e);
                    workers.abort_all();
                }
                state
            }
        };
        debug!(segment = segment.index, ?state, "segment worker finished");
        events.send(Event::SegmentFinished {
            segment: segment.index,
            state: state.clone(),
        });
        states[segment.index] = state;
    }

    if let Some(e) = failure {
        return Err(e);
    }

    if let Some(index) = states
        .iter()
        .position(|state| *state == SegmentState::Fetching)
    {
        return Err(ParcelError::Worker {
            index,
            message: "worker was cancelled before reporting a result".to_string(),
        });
    }

    Ok(states)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("worker panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("worker panicked: {}", message)
    } else {
        "worker panicked".to_string()
    }
}
