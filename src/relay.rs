use crate::{
    handlers::handle_payment,
    middleware::AdmissionController,
    models::Event,
    services::RetentionSweeper,
};
use axum::{routing::post, Router};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

pub struct PaidRelay {
    admission: Arc<AdmissionController>,
    sweeper: Mutex<Option<RetentionSweeper>>,
}

impl PaidRelay {
    pub fn new(admission: Arc<AdmissionController>, sweeper: RetentionSweeper) -> Self {
        Self {
            admission,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    pub fn name(&self) -> &'static str {
        "PaidRelay"
    }

    // Starts the retention sweeper. Only the first call spawns anything.
    pub fn init(&self) -> Option<JoinHandle<()>> {
        let sweeper = match self.sweeper.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        sweeper.map(RetentionSweeper::spawn)
    }

    pub fn on_initialized<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let payments: Router<S> = Router::new()
            .route("/payments", post(handle_payment))
            .with_state(self.admission.clone());
        router.merge(payments)
    }

    pub async fn accept_event(&self, event: &Event) -> bool {
        self.admission.should_accept(event).await
    }
}
