//! Background task that runs geolocation and station queries for the UI loop.
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::actions::{Request, Response};
use crate::api::StationQuery;
use crate::geolocation::Geolocator;

pub struct WorkerHandle {
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Stops the worker without waiting for a request in progress.
    pub async fn shutdown(self) {
        self.task.abort();
        match self.task.await {
            Ok(()) => debug!("Worker finished before shutdown"),
            Err(e) if e.is_cancelled() => debug!("Worker cancelled"),
            Err(e) => warn!("Worker task failed: {}", e),
        }
    }
}

pub fn spawn<Q, G>(
    client: Q,
    geolocator: G,
    mut req_rx: mpsc::Receiver<Request>,
    resp_tx: mpsc::Sender<Response>,
) -> WorkerHandle
where
    Q: StationQuery,
    G: Geolocator,
{
    let task = tokio::spawn(async move {
        while let Some(request) = req_rx.recv().await {
            let response = handle_request(&client, &geolocator, request).await;
            if resp_tx.send(response).await.is_err() {
                break;
            }
        }
        info!("Worker stopped");
    });
    WorkerHandle { task }
}

pub async fn handle_request<Q, G>(client: &Q, geolocator: &G, request: Request) -> Response
where
    Q: StationQuery,
    G: Geolocator,
{
    match request {
        Request::Locate { search_id, options } => {
            debug!("Requesting user location...");
            let result = geolocator.current_position(options).await;
            Response::Located { search_id, result }
        }
        Request::Search {
            search_id,
            request,
            limit,
        } => {
            let result = client
                .query(request.origin, request.radius_km, limit)
                .await;
            Response::SearchCompleted {
                search_id,
                request,
                result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Coordinate, QueryError, SearchRequest, Station};
    use crate::geolocation::{FixedGeolocator, PositionOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingClient {
        calls: Arc<AtomicUsize>,
    }

    impl StationQuery for CountingClient {
        async fn query(
            &self,
            origin: Coordinate,
            _radius_km: u32,
            _limit: u32,
        ) -> Result<Vec<Station>, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Station {
                id: "1".to_string(),
                name: None,
                brand: None,
                address: None,
                location: origin,
                distance_km: 0.0,
            }])
        }
    }

    #[tokio::test]
    async fn search_request_calls_client_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = CountingClient {
            calls: Arc::clone(&calls),
        };
        let geo = FixedGeolocator::new(Coordinate::new(0.0, 0.0));
        let request = SearchRequest {
            origin: Coordinate::new(52.0, 21.0),
            radius_km: 10,
        };

        let response = handle_request(
            &client,
            &geo,
            Request::Search {
                search_id: 4,
                request,
                limit: 50,
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match response {
            Response::SearchCompleted {
                search_id,
                request: echoed,
                result,
            } => {
                assert_eq!(search_id, 4);
                assert_eq!(echoed, request);
                assert_eq!(result.unwrap().len(), 1);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn spawned_worker_answers_locate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = CountingClient {
            calls: Arc::clone(&calls),
        };
        let geo = FixedGeolocator::new(Coordinate::new(50.0, 19.9));
        let (req_tx, req_rx) = mpsc::channel(4);
        let (resp_tx, mut resp_rx) = mpsc::channel(4);
        let handle = spawn(client, geo, req_rx, resp_tx);

        req_tx
            .send(Request::Locate {
                search_id: 1,
                options: PositionOptions::default(),
            })
            .await
            .unwrap();

        match resp_rx.recv().await.unwrap() {
            Response::Located { search_id, result } => {
                assert_eq!(search_id, 1);
                assert_eq!(result, Ok(Coordinate::new(50.0, 19.9)));
            }
            other => panic!("unexpected response {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        drop(req_tx);
        handle.shutdown().await;
    }

    struct SlowClient;

    impl StationQuery for SlowClient {
        async fn query(
            &self,
            _origin: Coordinate,
            _radius_km: u32,
            _limit: u32,
        ) -> Result<Vec<Station>, QueryError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn shutdown_does_not_wait_for_a_running_query() {
        let geo = FixedGeolocator::new(Coordinate::new(0.0, 0.0));
        let (req_tx, req_rx) = mpsc::channel(4);
        let (resp_tx, resp_rx) = mpsc::channel(4);
        let handle = spawn(SlowClient, geo, req_rx, resp_tx);

        req_tx
            .send(Request::Search {
                search_id: 1,
                request: SearchRequest {
                    origin: Coordinate::new(52.0, 21.0),
                    radius_km: 10,
                },
                limit: 50,
            })
            .await
            .unwrap();
        tokio::task::yield_now().await;
        drop(req_tx);
        drop(resp_rx);

        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("worker shutdown blocked on the running query");
    }
}
