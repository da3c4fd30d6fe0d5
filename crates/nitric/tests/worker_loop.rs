//! Tests for the streaming worker loop, driven through a mock transport.

#![allow(clippy::unwrap_used)] // unwrap is acceptable in tests

#[macro_use]
mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{MockTransport, init_tracing};
use tonic::Status;

use nitric::context::WorkerContext;
use nitric::middleware::{Handler, compose, middleware};
use nitric::proto::{apis, faas, topics};
use nitric::worker::Worker;
use nitric::{
    ApiRoute, Config, Error, HttpContext, MessageContext, Middleware, Shutdown, StreamWorker,
    Subscription, TriggerContext, TriggerHandlers,
};

fn http_event(id: &str, path: &str) -> apis::ServerMessage {
    apis::ServerMessage {
        id: id.to_string(),
        content: Some(apis::server_message::Content::HttpRequest(
            apis::HttpRequest {
                method: "GET".to_string(),
                path: path.to_string(),
                ..Default::default()
            },
        )),
    }
}

fn api_ack() -> apis::ServerMessage {
    apis::ServerMessage {
        id: String::new(),
        content: Some(apis::server_message::Content::RegistrationResponse(
            apis::RegistrationResponse {},
        )),
    }
}

fn topic_event(id: &str) -> topics::ServerMessage {
    topics::ServerMessage {
        id: id.to_string(),
        content: Some(topics::server_message::Content::MessageRequest(
            topics::MessageRequest {
                topic_name: "orders".to_string(),
                message: None,
            },
        )),
    }
}

fn http_response(msg: &apis::ClientMessage) -> &apis::HttpResponse {
    match &msg.content {
        Some(apis::client_message::Content::HttpResponse(resp)) => resp,
        other => panic!("expected an http response, got {other:?}"),
    }
}

fn api_worker(
    transport: MockTransport<apis::ClientMessage, apis::ServerMessage>,
    middleware: Middleware<HttpContext>,
) -> StreamWorker<HttpContext> {
    let route = ApiRoute::new("main", "/orders").method("GET");
    StreamWorker::new("api main GET /orders", transport, route.into(), middleware)
}

fn set_status(status: i32) -> Middleware<HttpContext> {
    middleware(move |mut ctx: HttpContext, next: Handler<HttpContext>| async move {
        ctx.response.status = status;
        next(ctx).await
    })
}

fn failing<C: Send + 'static>() -> Middleware<C> {
    middleware(|_ctx: C, _next: Handler<C>| async move { Err(anyhow::anyhow!("handler failed")) })
}

fn counting<C: Send + 'static>(count: &Arc<AtomicUsize>) -> Middleware<C> {
    let count = Arc::clone(count);
    middleware(move |ctx: C, next: Handler<C>| {
        count.fetch_add(1, Ordering::SeqCst);
        next(ctx)
    })
}

#[tokio::test]
async fn test_dispatch_sends_handler_response() {
    init_tracing();
    let (transport, recorded) = MockTransport::scripted(vec![Ok(http_event("1", "/orders"))]);

    api_worker(transport, compose([set_status(201)]))
        .run(Shutdown::never())
        .await
        .unwrap();

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.sent.len(), 2);
    let response = &recorded.sent[1];
    assert_eq!(response.id, "1");
    assert_eq!(http_response(response).status, 201);
}

#[tokio::test]
async fn test_registration_is_first_frame() {
    let (transport, recorded) = MockTransport::scripted(vec![Ok(http_event("1", "/orders"))]);

    api_worker(transport, compose([])).run(Shutdown::never()).await.unwrap();

    let recorded = recorded.lock().unwrap();
    let Some(apis::client_message::Content::RegistrationRequest(req)) = &recorded.sent[0].content
    else {
        panic!("expected the registration first");
    };
    assert_eq!(req.api, "main");
    assert_eq!(req.path, "/orders");
    assert_eq!(req.methods, vec!["GET"]);
}

#[tokio::test]
async fn test_clean_shutdown_on_eof() {
    let count = Arc::new(AtomicUsize::new(0));
    let (transport, recorded) = MockTransport::scripted(vec![]);

    let result = api_worker(transport, counting(&count))
        .run(Shutdown::never())
        .await;

    assert!(result.is_ok());
    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.closes, 1);
    // Only the registration went out.
    assert_eq!(recorded.sent.len(), 1);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_registration_ack_skips_middleware() {
    let count = Arc::new(AtomicUsize::new(0));
    let (transport, recorded) = MockTransport::scripted(vec![Ok(api_ack())]);

    api_worker(transport, counting(&count))
        .run(Shutdown::never())
        .await
        .unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(recorded.lock().unwrap().sent.len(), 1);
}

#[tokio::test]
async fn test_unrecognized_frame_is_skipped() {
    let count = Arc::new(AtomicUsize::new(0));
    let empty = apis::ServerMessage {
        id: "0".to_string(),
        content: None,
    };
    let (transport, recorded) =
        MockTransport::scripted(vec![Ok(empty), Ok(http_event("1", "/orders"))]);

    api_worker(transport, counting(&count))
        .run(Shutdown::never())
        .await
        .unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 1);
    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.sent.len(), 2);
    assert_eq!(recorded.sent[1].id, "1");
}

#[tokio::test]
async fn test_http_handler_error_becomes_500() {
    let (transport, recorded) = MockTransport::scripted(vec![Ok(http_event("1", "/orders"))]);

    api_worker(transport, compose([set_status(201), failing()]))
        .run(Shutdown::never())
        .await
        .unwrap();

    let recorded = recorded.lock().unwrap();
    let response = http_response(&recorded.sent[1]);
    assert_eq!(response.status, 500);
    assert_eq!(response.headers["Content-Type"].value, vec!["text/plain"]);
    assert_eq!(response.body, b"Internal Server Error");
}

#[tokio::test]
async fn test_message_handler_error_reports_failure() {
    let (transport, recorded) = MockTransport::scripted(vec![Ok(topic_event("9"))]);

    StreamWorker::<MessageContext>::new(
        "subscription orders",
        transport,
        Subscription::new("orders").into(),
        failing(),
    )
    .run(Shutdown::never())
    .await
    .unwrap();

    let recorded = recorded.lock().unwrap();
    let response = &recorded.sent[1];
    assert_eq!(response.id, "9");
    assert_eq!(
        response.content,
        Some(topics::client_message::Content::MessageResponse(
            topics::MessageResponse { success: false }
        ))
    );
}

#[tokio::test]
async fn test_correlation_ids_follow_events() {
    let count = Arc::new(AtomicUsize::new(0));
    let events = ["a", "b", "c"].map(|id| Ok(http_event(id, "/orders")));
    let (transport, recorded) = MockTransport::scripted(events.into());

    api_worker(transport, counting(&count))
        .run(Shutdown::never())
        .await
        .unwrap();

    // The same chain serves every event.
    assert_eq!(count.load(Ordering::SeqCst), 3);
    let ids: Vec<_> = recorded.lock().unwrap().sent[1..]
        .iter()
        .map(|msg| msg.id.clone())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_recv_error_is_fatal() {
    let (transport, recorded) = MockTransport::scripted(vec![
        Err(Status::internal("broken pipe")),
        Ok(http_event("1", "/orders")),
    ]);

    let err = api_worker(transport, compose([]))
        .run(Shutdown::never())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Stream(ref status) if status.code() == tonic::Code::Internal));
    assert_eq!(recorded.lock().unwrap().sent.len(), 1);
}

#[tokio::test]
async fn test_send_error_is_fatal() {
    let (transport, _recorded) = MockTransport::scripted(vec![
        Ok(http_event("1", "/orders")),
        Ok(http_event("2", "/orders")),
    ]);
    let transport = transport.failing_send(Status::unavailable("gone"));

    let err = api_worker(transport, compose([]))
        .run(Shutdown::never())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Stream(ref status) if status.code() == tonic::Code::Unavailable));
}

#[tokio::test]
async fn test_open_error_is_returned() {
    let (transport, recorded) = MockTransport::scripted(vec![]);
    let transport = transport.failing_open(Status::unavailable("connection refused"));

    let err = api_worker(transport, compose([]))
        .run(Shutdown::never())
        .await
        .unwrap_err();

    assert!(err.is_eof());
    assert!(recorded.lock().unwrap().sent.is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_idle_worker() {
    init_tracing();
    let (transport, feed, recorded) = MockTransport::new();
    let (handle, shutdown) = Shutdown::channel();

    let task = tokio::spawn(api_worker(transport, compose([])).run(shutdown));
    feed.send(Ok(http_event("1", "/orders"))).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    test_log!("Requesting shutdown");
    handle.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.closes, 1);
    assert_eq!(recorded.sent.len(), 2);
    drop(feed);
}

#[tokio::test]
async fn test_handler_timeout_fails_event() {
    let (transport, recorded) = MockTransport::scripted(vec![
        Ok(http_event("slow", "/orders")),
        Ok(http_event("fast", "/orders")),
    ]);
    let sleepy = middleware(|ctx: HttpContext, next: Handler<HttpContext>| async move {
        if ctx.id() == "slow" {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        next(ctx).await
    });

    api_worker(transport, sleepy)
        .with_handler_timeout(Duration::from_millis(20))
        .run(Shutdown::never())
        .await
        .unwrap();

    let recorded = recorded.lock().unwrap();
    assert_eq!(http_response(&recorded.sent[1]).status, 500);
    assert_eq!(http_response(&recorded.sent[2]).status, 200);
}

#[tokio::test]
async fn test_configure_applies_handler_timeout() {
    let (transport, recorded) = MockTransport::scripted(vec![Ok(http_event("1", "/orders"))]);
    let stuck = middleware(|_ctx: HttpContext, _next: Handler<HttpContext>| async move {
        std::future::pending::<()>().await;
        Err(anyhow::anyhow!("unreachable"))
    });

    let mut worker = Box::new(api_worker(transport, stuck));
    worker.configure(&Config {
        handler_timeout_ms: Some(20),
        ..Config::default()
    });
    worker.start(Shutdown::never()).await.unwrap();

    assert_eq!(http_response(&recorded.lock().unwrap().sent[1]).status, 500);
}

fn trigger(id: &str, context: faas::trigger_request::Context) -> faas::ServerMessage {
    faas::ServerMessage {
        id: id.to_string(),
        content: Some(faas::server_message::Content::TriggerRequest(
            faas::TriggerRequest {
                data: b"{}".to_vec(),
                mime_type: "application/json".to_string(),
                context: Some(context),
            },
        )),
    }
}

fn trigger_response(msg: &faas::ClientMessage) -> &faas::trigger_response::Context {
    match &msg.content {
        Some(faas::client_message::Content::TriggerResponse(faas::TriggerResponse {
            context: Some(context),
            ..
        })) => context,
        other => panic!("expected a trigger response, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unroutable_trigger_reported_at_eof() {
    let topic = faas::trigger_request::Context::Topic(faas::TopicTriggerContext {
        topic: "orders".to_string(),
    });
    let http = faas::trigger_request::Context::Http(faas::HttpTriggerContext {
        method: "GET".to_string(),
        path: "/".to_string(),
        ..Default::default()
    });
    let (transport, recorded) =
        MockTransport::scripted(vec![Ok(trigger("t1", topic)), Ok(trigger("t2", http))]);

    let handlers = TriggerHandlers::new().http(set_status(202));
    let err = StreamWorker::<TriggerContext>::new(
        "trigger orders",
        transport,
        faas::ClientMessage {
            id: String::new(),
            content: Some(faas::client_message::Content::InitRequest(
                faas::InitRequest {
                    name: "orders".to_string(),
                },
            )),
        },
        handlers.into_middleware(),
    )
    .run(Shutdown::never())
    .await
    .unwrap_err();

    assert!(matches!(err, Error::NoHandler));
    assert_eq!(err.to_string(), "no handler available for trigger type");

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.closes, 1);
    assert_eq!(
        trigger_response(&recorded.sent[1]),
        &faas::trigger_response::Context::Topic(faas::TopicResponseContext { success: false })
    );
    // The loop kept serving after the failure.
    assert!(matches!(
        trigger_response(&recorded.sent[2]),
        faas::trigger_response::Context::Http(faas::HttpResponseContext { status: 202, .. })
    ));
}
