use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use tracing::info;

use crate::error::{Error, Result};
use crate::types::{FeatureCollection, Filter};

use super::{FeatureFetcher, FeatureSourceResolver};

/// Pending result of a resolve running on a background thread.
pub struct ResolveHandle {
    rx: Receiver<Result<FeatureCollection>>,
}

/// Runs `resolver.resolve(filter)` on its own thread. Sources are still tried
/// strictly in order inside that thread; the handle only adds a deadline for
/// the caller.
pub fn spawn_resolve<F>(resolver: FeatureSourceResolver<F>, filter: Filter) -> ResolveHandle
where
    F: FeatureFetcher + Send + 'static,
{
    let (tx, rx) = bounded::<Result<FeatureCollection>>(1);
    std::thread::spawn(move || {
        let _ = tx.send(resolver.resolve(&filter));
    });
    ResolveHandle { rx }
}

impl ResolveHandle {
    /// Blocks for at most `timeout`. The background thread is left to finish
    /// on its own when the deadline passes.
    pub fn wait(self, timeout: Duration) -> Result<FeatureCollection> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                info!("Resolve did not finish within {:?}", timeout);
                Err(Error::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::Io(std::io::Error::other(
                "resolve worker exited without a result",
            ))),
        }
    }
}
