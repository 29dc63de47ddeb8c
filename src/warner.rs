use tracing::info;

use crate::destalinator::Destalinator;
use crate::slacker::Slacker;

/// Warning phase: warns every channel quiet for `warn_threshold` days.
pub struct Warner<'a, S> {
    ds: &'a Destalinator<S>,
}

impl<'a, S: Slacker> Warner<'a, S> {
    pub fn new(ds: &'a Destalinator<S>) -> Self {
        Self { ds }
    }

    pub async fn warn(&self, force_warn: bool) -> Vec<String> {
        let days = self.ds.config().warn_threshold;
        info!(days, force_warn, "warning stale channels");

        self.ds.warn_all(days, force_warn).await
    }
}
