use super::*;

impl RevocationScheduler {
    /// Fires every job whose time has come. Due jobs run concurrently.
    pub async fn fire_due(
        &self,
        handler: Arc<dyn RevocationHandler>,
    ) -> Vec<(RevocationJobId, FireOutcome)> {
        let due = self.take_due(self.clock.now()).await;
        if due.is_empty() {
            return Vec::new();
        }

        let mut tasks = JoinSet::new();
        for job_id in due {
            let scheduler = self.clone();
            let handler = handler.clone();
            tasks.spawn(async move {
                let outcome = scheduler.fire(job_id, handler.as_ref()).await;
                (job_id, outcome)
            });
        }

        let mut fired = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((job_id, Ok(outcome))) => fired.push((job_id, outcome)),
                Ok((job_id, Err(error))) => {
                    warn!(job_id = %job_id, error = %error, "due revocation could not fire");
                }
                Err(error) => warn!(error = %error, "revocation task aborted"),
            }
        }
        fired
    }

    /// Runs the dispatch loop until `shutdown` flips to true or its sender drops.
    ///
    /// Jobs added while the loop sleeps wake it early. Jobs whose time has
    /// already passed fire on the next iteration.
    pub async fn run(
        &self,
        handler: Arc<dyn RevocationHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("revocation scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.fire_due(handler.clone()).await;
            self.prune_settled().await;

            let sleep_for = self.time_until_next_fire().await;
            tokio::select! {
                () = tokio::time::sleep(sleep_for) => {}
                () = self.wake.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("revocation scheduler stopped");
    }

    async fn time_until_next_fire(&self) -> Duration {
        match self.next_fire_at().await {
            Some(fire_at) => (fire_at - self.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.idle_interval),
            None => self.idle_interval,
        }
    }
}
