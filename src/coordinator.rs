use crate::config::InputConfig;
use crate::data::{self, LoadError};
use crate::types::Datasets;
use std::future::Future;
use tracing::info;

/// Drives both loads concurrently and hands their results to `on_all_complete`.
///
/// The continuation runs once, after both futures succeeded, whichever
/// finished first. The first failure is returned as is and the continuation
/// never runs; the other future is dropped unfinished.
pub async fn run_both<A, B, E, T>(
    neighborhoods: impl Future<Output = Result<A, E>>,
    crimes: impl Future<Output = Result<B, E>>,
    on_all_complete: impl FnOnce(A, B) -> T,
) -> Result<T, E> {
    let (a, b) = tokio::try_join!(neighborhoods, crimes)?;
    Ok(on_all_complete(a, b))
}

pub async fn load_datasets(input: &InputConfig) -> Result<Datasets, LoadError> {
    run_both(
        data::load_neighborhoods(input),
        data::load_crimes(input),
        |neighborhoods, crimes| {
            let datasets = Datasets { neighborhoods, crimes };
            info!(
                neighborhoods = datasets.neighborhoods.len(),
                crimes = datasets.crimes.len(),
                "Both datasets loaded"
            );
            datasets
        },
    )
    .await
}
