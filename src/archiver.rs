use tracing::info;

use crate::destalinator::Destalinator;
use crate::slacker::Slacker;

/// Archive phase: archives every channel quiet for `archive_threshold` days.
pub struct Archiver<'a, S> {
    ds: &'a Destalinator<S>,
}

impl<'a, S: Slacker> Archiver<'a, S> {
    pub fn new(ds: &'a Destalinator<S>) -> Self {
        Self { ds }
    }

    pub async fn archive(&self) -> Vec<String> {
        let days = self.ds.config().archive_threshold;
        info!(days, activated = self.ds.activated(), "archiving stale channels");

        self.ds.safe_archive_all(days).await
    }
}
