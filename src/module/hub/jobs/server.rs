use super::super::manager::SubscriptionManager;
use super::super::processor::{EventProcessor, ProcessingSummary};
use super::super::store::StoreError;
use crate::domain::event::et::EstimatedVehicleJourney;
use crate::domain::event::sx::PtSituationElement;
use crate::domain::event::TransitEvent;
use crate::domain::request::{SubscriptionRequest, TerminationRequest};
use crate::domain::Subscription;
use crate::library::http::PushClient;
use crate::library::storage::KeyValueStore;
use crate::library::EmptyResult;
use async_trait::async_trait;
use jatsl::{Job, JobManager};
use serde::Serialize;
use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};
use warp::{Filter, Rejection};

const MAX_BODY_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_reply(status: StatusCode, error: impl Display) -> Response {
    let body = ErrorBody {
        error: error.to_string(),
    };

    reply::with_status(reply::json(&body), status).into_response()
}

async fn add_subscription<S: KeyValueStore>(
    subscription: Subscription,
    manager: SubscriptionManager<S>,
) -> Result<Response, Infallible> {
    Ok(match manager.add(subscription).await {
        Ok(stored) => reply::json(&stored).into_response(),
        Err(StoreError::Invalid(error)) => error_reply(StatusCode::BAD_REQUEST, error),
        Err(StoreError::Storage(error)) => {
            error!(?error, "Unable to store subscription");
            error_reply(StatusCode::SERVICE_UNAVAILABLE, error)
        }
    })
}

async fn list_subscriptions<S: KeyValueStore>(
    manager: SubscriptionManager<S>,
) -> Result<Response, Infallible> {
    Ok(match manager.list_redacted().await {
        Ok(subscriptions) => reply::json(&subscriptions).into_response(),
        Err(error) => error_reply(StatusCode::SERVICE_UNAVAILABLE, error),
    })
}

async fn remove_subscription<S: KeyValueStore>(
    id: String,
    manager: SubscriptionManager<S>,
) -> Result<Response, Infallible> {
    Ok(match manager.remove(&id).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(error) => error_reply(StatusCode::SERVICE_UNAVAILABLE, error),
    })
}

async fn subscribe<S: KeyValueStore>(
    request: SubscriptionRequest,
    manager: SubscriptionManager<S>,
) -> Result<Response, Infallible> {
    Ok(match manager.subscribe(&request).await {
        Ok(response) => reply::json(&response).into_response(),
        Err(error) => error_reply(StatusCode::SERVICE_UNAVAILABLE, error),
    })
}

async fn terminate<S: KeyValueStore>(
    request: TerminationRequest,
    manager: SubscriptionManager<S>,
) -> Result<Response, Infallible> {
    Ok(match manager.terminate(&request).await {
        Ok(response) => reply::json(&response).into_response(),
        Err(error) => error_reply(StatusCode::SERVICE_UNAVAILABLE, error),
    })
}

async fn ingest<S, C, E>(
    events: Vec<E>,
    processor: Arc<EventProcessor<S, C>>,
) -> Result<Response, Infallible>
where
    S: KeyValueStore,
    C: PushClient,
    E: Into<TransitEvent>,
{
    let mut summary = ProcessingSummary::default();

    for event in events.into_iter().map(Into::into) {
        match processor.process(&event).await {
            Ok(processed) => summary += processed,
            Err(error) => {
                error!(?error, "Unable to match event");
                return Ok(error_reply(StatusCode::SERVICE_UNAVAILABLE, error));
            }
        }
    }

    Ok(reply::json(&summary).into_response())
}

/// Filter serving the subscription management and event ingestion endpoints
pub fn routes<S, C>(
    manager: SubscriptionManager<S>,
    processor: Arc<EventProcessor<S, C>>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone + Send + Sync + 'static
where
    S: KeyValueStore + Clone + 'static,
    C: PushClient + 'static,
{
    let with_manager = warp::any().map(move || manager.clone());
    let with_processor = warp::any().map(move || processor.clone());
    let json_body = warp::body::content_length_limit(MAX_BODY_SIZE);

    let add = warp::post()
        .and(warp::path!("subscriptions"))
        .and(json_body)
        .and(warp::body::json())
        .and(with_manager.clone())
        .and_then(add_subscription::<S>);

    let list = warp::get()
        .and(warp::path!("subscriptions"))
        .and(with_manager.clone())
        .and_then(list_subscriptions::<S>);

    let remove = warp::delete()
        .and(warp::path!("subscriptions" / String))
        .and(with_manager.clone())
        .and_then(remove_subscription::<S>);

    let subscribe = warp::post()
        .and(warp::path!("siri" / "subscribe"))
        .and(json_body)
        .and(warp::body::json())
        .and(with_manager.clone())
        .and_then(subscribe::<S>);

    let terminate = warp::post()
        .and(warp::path!("siri" / "terminate"))
        .and(json_body)
        .and(warp::body::json())
        .and(with_manager)
        .and_then(terminate::<S>);

    let ingest_et = warp::post()
        .and(warp::path!("ingest" / "et"))
        .and(json_body)
        .and(warp::body::json())
        .and(with_processor.clone())
        .and_then(ingest::<S, C, EstimatedVehicleJourney>);

    let ingest_sx = warp::post()
        .and(warp::path!("ingest" / "sx"))
        .and(json_body)
        .and(warp::body::json())
        .and(with_processor)
        .and_then(ingest::<S, C, PtSituationElement>);

    add.or(list)
        .unify()
        .or(remove)
        .unify()
        .or(subscribe)
        .unify()
        .or(terminate)
        .unify()
        .or(ingest_et)
        .unify()
        .or(ingest_sx)
        .unify()
}

/// Serves the HTTP interface until the job is terminated
///
/// Once terminated, no further events are accepted and in-flight requests are completed.
pub struct ServerJob<S, C> {
    port: u16,
    manager: SubscriptionManager<S>,
    processor: Arc<EventProcessor<S, C>>,
}

impl<S, C> ServerJob<S, C> {
    /// Creates a new instance listening on all interfaces at the given port
    pub fn new(
        port: u16,
        manager: SubscriptionManager<S>,
        processor: Arc<EventProcessor<S, C>>,
    ) -> Self {
        Self {
            port,
            manager,
            processor,
        }
    }
}

#[async_trait]
impl<S, C> Job for ServerJob<S, C>
where
    S: KeyValueStore + Clone + 'static,
    C: PushClient + 'static,
{
    const NAME: &'static str = module_path!();
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    async fn execute(&self, manager: JobManager) -> EmptyResult {
        let routes = routes(self.manager.clone(), self.processor.clone())
            .with(warp::trace::request());

        let source_addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let (addr, server) =
            warp::serve(routes).bind_with_graceful_shutdown(source_addr, manager.termination_signal());

        info!(?addr, "Accepting subscriptions and events");
        manager.ready().await;
        server.await;

        Ok(())
    }
}
