/*!
 * Server Tests
 * Line protocol over real TCP connections, status mapping, and env config
 */

use pretty_assertions::assert_eq;
use queue_broker::api::status;
use queue_broker::core::config::{ENV_QUEUES_MAX_COUNT, ENV_QUEUE_MAX_SIZE};
use queue_broker::core::limits::MAX_REQUEST_LINE_BYTES;
use queue_broker::{
    BrokerConfig, BrokerHandler, BrokerServer, CancelToken, RegistryLimits, Response,
    ServerConfig, TopicRegistry,
};
use serial_test::serial;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

struct TestBroker {
    address: SocketAddr,
    registry: Arc<TopicRegistry<String>>,
    shutdown: CancelToken,
    server: JoinHandle<queue_broker::api::ApiResult<()>>,
}

impl TestBroker {
    async fn start(limits: RegistryLimits, request_timeout: Duration) -> Self {
        let registry = Arc::new(TopicRegistry::new(limits).unwrap());
        let handler = Arc::new(BrokerHandler::new(Arc::clone(&registry)));
        let shutdown = CancelToken::new();

        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap())
            .with_timeout(request_timeout)
            .with_max_connections(8);
        let server = BrokerServer::bind(config, handler, shutdown.clone())
            .await
            .unwrap();
        let address = server.local_addr().unwrap();

        Self {
            address,
            registry,
            shutdown,
            server: tokio::spawn(server.run()),
        }
    }

    async fn connect(&self) -> Client {
        let stream = TcpStream::connect(self.address).await.unwrap();
        let (read, write) = stream.into_split();
        Client {
            reader: BufReader::new(read),
            writer: write,
        }
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.server.await.unwrap().unwrap();
        self.registry.close_all().await;
    }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn call(&mut self, request: &str) -> Response {
        self.writer.write_all(request.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();

        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }
}

#[tokio::test]
async fn test_put_get_over_tcp() {
    let broker = TestBroker::start(RegistryLimits::new(1, 2), Duration::from_secs(1)).await;
    let mut client = broker.connect().await;

    let put = r#"{"method":"PUT","queue":"q","message":"a"}"#;
    assert_eq!(client.call(put).await, Response::ok());
    let put = r#"{"method":"PUT","queue":"q","message":"b"}"#;
    assert_eq!(client.call(put).await, Response::ok());

    let get = r#"{"method":"GET","queue":"q"}"#;
    assert_eq!(client.call(get).await, Response::with_message("a".into()));
    assert_eq!(client.call(get).await, Response::with_message("b".into()));

    broker.stop().await;
}

#[tokio::test]
async fn test_waiting_consumer_on_second_connection() {
    let broker = TestBroker::start(RegistryLimits::new(1, 2), Duration::from_secs(2)).await;
    let mut consumer = broker.connect().await;
    let mut producer = broker.connect().await;

    let waiting = tokio::spawn(async move {
        consumer
            .call(r#"{"method":"GET","queue":"jobs","timeout":2}"#)
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let put = r#"{"method":"PUT","queue":"jobs","message":"work"}"#;
    assert!(producer.call(put).await.is_success());
    assert_eq!(
        waiting.await.unwrap(),
        Response::with_message("work".into())
    );

    broker.stop().await;
}

#[tokio::test]
async fn test_status_codes() {
    let broker = TestBroker::start(RegistryLimits::new(1, 1), Duration::from_millis(100)).await;
    let mut client = broker.connect().await;

    // Empty topic: the wait is cut short by the server timeout
    let response = client.call(r#"{"method":"GET","queue":"q"}"#).await;
    assert_eq!(response.status, status::NOT_FOUND);
    assert_eq!(
        response.error.as_deref(),
        Some("topic q: didn't wait for the message")
    );

    // Topic limit reached
    let response = client
        .call(r#"{"method":"PUT","queue":"other","message":"x"}"#)
        .await;
    assert_eq!(response.status, status::TOO_MANY_REQUESTS);

    // Full buffer: the put gives up and nothing is stored
    let put = r#"{"method":"PUT","queue":"q","message":"x"}"#;
    assert!(client.call(put).await.is_success());
    assert_eq!(client.call(put).await.status, status::UNAVAILABLE);

    let stats = client.call(r#"{"method":"STATS","queue":"q"}"#).await;
    let stats = stats.stats.unwrap();
    assert_eq!(stats.buffered, 1);
    assert_eq!(stats.puts_cancelled, 1);

    let response = client.call(r#"{"method":"STATS","queue":"nope"}"#).await;
    assert_eq!(response.status, status::NOT_FOUND);

    // Malformed lines get 400 and the connection stays usable
    assert_eq!(client.call("{oops").await.status, status::BAD_REQUEST);
    assert_eq!(
        client.call(r#"{"method":"GET","queue":"q"}"#).await,
        Response::with_message("x".into())
    );

    broker.stop().await;
}

#[tokio::test]
async fn test_oversized_line_rejected_and_connection_closed() {
    let broker = TestBroker::start(RegistryLimits::new(1, 2), Duration::from_secs(1)).await;
    let mut client = broker.connect().await;

    // Exactly one byte past the bound, with no newline in sight
    let line = "x".repeat(MAX_REQUEST_LINE_BYTES + 1);
    client.writer.write_all(line.as_bytes()).await.unwrap();

    let mut reply = String::new();
    client.reader.read_line(&mut reply).await.unwrap();
    let response: Response = serde_json::from_str(&reply).unwrap();
    assert_eq!(response.status, status::BAD_REQUEST);

    reply.clear();
    let read = client.reader.read_line(&mut reply).await.unwrap();
    assert_eq!(read, 0);

    broker.stop().await;
}

#[tokio::test]
async fn test_request_timeout_tightens_server_timeout() {
    let broker = TestBroker::start(RegistryLimits::new(1, 2), Duration::from_secs(5)).await;
    let mut client = broker.connect().await;

    let started = Instant::now();
    let response = client
        .call(r#"{"method":"GET","queue":"q","timeout":0}"#)
        .await;

    assert_eq!(response.status, status::NOT_FOUND);
    assert!(started.elapsed() < Duration::from_secs(1));

    broker.stop().await;
}

#[tokio::test]
async fn test_huge_request_timeout_is_served() {
    let broker = TestBroker::start(RegistryLimits::new(1, 2), Duration::from_millis(100)).await;
    let mut client = broker.connect().await;

    let response = client
        .call(r#"{"method":"GET","queue":"q","timeout":18446744073709551615}"#)
        .await;
    assert_eq!(response.status, status::NOT_FOUND);

    // The connection survives and keeps serving
    let put = r#"{"method":"PUT","queue":"q","message":"still here"}"#;
    assert!(client.call(put).await.is_success());

    broker.stop().await;
}

#[tokio::test]
async fn test_shutdown_releases_waiting_request() {
    let broker = TestBroker::start(RegistryLimits::new(1, 2), Duration::from_secs(10)).await;
    let mut client = broker.connect().await;

    let waiting =
        tokio::spawn(async move { client.call(r#"{"method":"GET","queue":"q"}"#).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    broker.shutdown.cancel();
    let response = waiting.await.unwrap();
    assert_eq!(response.status, status::NOT_FOUND);

    broker.server.await.unwrap().unwrap();
    broker.registry.close_all().await;
}

#[test]
#[serial]
fn test_config_from_process_env() {
    std::env::set_var(ENV_QUEUE_MAX_SIZE, "5");
    std::env::set_var(ENV_QUEUES_MAX_COUNT, "3");

    let config = BrokerConfig::from_env();

    std::env::remove_var(ENV_QUEUE_MAX_SIZE);
    std::env::remove_var(ENV_QUEUES_MAX_COUNT);

    let config = config.unwrap();
    assert_eq!(config.limits(), RegistryLimits::new(3, 5));
    assert_eq!(config.request_timeout, Duration::from_secs(1));
}

#[test]
#[serial]
fn test_config_rejects_zero_capacity() {
    std::env::set_var(ENV_QUEUE_MAX_SIZE, "0");
    let result = BrokerConfig::from_env();
    std::env::remove_var(ENV_QUEUE_MAX_SIZE);

    assert!(result.is_err());
}
