use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use sqlgate::backend::{
    BackendError, BackendResult, ExecContext, ExecutionBackend, MemoryBackend,
};
use sqlgate::config::{AuthMode, UsersConfig};
use sqlgate::handle::Handle;
use sqlgate::operation::OperationState;
use sqlgate::wire::{Request, Response, read_frame, write_frame};
use sqlgate::{GatewayServer, GatewayService, SessionPolicy};

// -----------------------------------------------------------------------------
// ----- Service / server builders ---------------------------------------------

pub fn open_policy() -> SessionPolicy {
    SessionPolicy {
        auth_mode: AuthMode::None,
        allow_user_substitution: false,
        users: UsersConfig::empty(),
    }
}

#[allow(dead_code)]
pub fn service() -> Arc<GatewayService> {
    GatewayService::new(open_policy(), Arc::new(MemoryBackend::new()))
}

pub struct TestServer {
    pub addr: SocketAddr,
    task: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Binds an ephemeral port and runs the accept loop on a background task
/// until the `TestServer` is dropped.
pub async fn start_server(
    service: Arc<GatewayService>,
    max_workers: usize,
    login_timeout: Duration,
) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("listener addr");

    let server = GatewayServer::new(service, max_workers, login_timeout);
    let task = tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    TestServer { addr, task }
}

// -----------------------------------------------------------------------------
// ----- TestClient ------------------------------------------------------------

/// A minimal wire client: one frame out, one frame back.
pub struct TestClient {
    stream: TcpStream,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect to gateway");
        Self { stream }
    }

    pub async fn call(&mut self, request: &Request) -> Response {
        let body = serde_json::to_vec(request).expect("encode request");
        write_frame(&mut self.stream, &body)
            .await
            .expect("write frame");

        let frame = read_frame(&mut self.stream)
            .await
            .expect("read frame")
            .expect("server closed the connection");
        serde_json::from_slice(&frame).expect("decode response")
    }

    /// Sends a pre-encoded frame, for exercising the decode error path.
    #[allow(dead_code)]
    pub async fn call_raw(&mut self, body: &[u8]) -> Response {
        write_frame(&mut self.stream, body).await.expect("write frame");

        let frame = read_frame(&mut self.stream)
            .await
            .expect("read frame")
            .expect("server closed the connection");
        serde_json::from_slice(&frame).expect("decode response")
    }

    /// Waits for a frame the client never asked for (the admission rejection).
    #[allow(dead_code)]
    pub async fn read_pushed(&mut self) -> Option<Response> {
        let frame = read_frame(&mut self.stream).await.ok()??;
        serde_json::from_slice(&frame).ok()
    }

    pub async fn open_session(&mut self, username: &str) -> Handle {
        let response = self
            .call(&Request::OpenSession {
                username: username.to_string(),
                password: String::new(),
                configuration: Default::default(),
            })
            .await;

        match response {
            Response::OpenSession {
                status,
                session_handle: Some(handle),
            } if status.is_ok() => handle,
            other => panic!("open_session failed: {other:?}"),
        }
    }

    /// Polls the operation until it leaves Initialized/Running.
    #[allow(dead_code)]
    pub async fn wait_until_settled(&mut self, operation: Handle) -> OperationState {
        for _ in 0..1000 {
            let response = self
                .call(&Request::GetOperationStatus {
                    operation_handle: operation,
                })
                .await;

            match response {
                Response::GetOperationStatus {
                    state: Some(state), ..
                } if state.is_terminal() => return state,
                Response::GetOperationStatus { .. } => sleep(Duration::from_millis(5)).await,
                other => panic!("get_operation_status failed: {other:?}"),
            }
        }
        panic!("operation {operation} never settled");
    }
}

// -----------------------------------------------------------------------------
// ----- RecordingBackend ------------------------------------------------------

/// Wraps the in-memory backend and tracks how many statements are executing
/// at once, so tests can observe the per-session serialization guarantee.
#[allow(dead_code)]
pub struct RecordingBackend {
    inner: MemoryBackend,
    active: AtomicUsize,
    max_active: AtomicUsize,
    hold: Duration,
}

#[allow(dead_code)]
impl RecordingBackend {
    pub fn new(hold: Duration) -> Self {
        Self {
            inner: MemoryBackend::new(),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            hold,
        }
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl ExecutionBackend for RecordingBackend {
    fn execute(&self, ctx: &ExecContext, statement: &str) -> Result<BackendResult, BackendError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        std::thread::sleep(self.hold);
        let outcome = self.inner.execute(ctx, statement);

        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn get_catalogs(&self, ctx: &ExecContext) -> Result<BackendResult, BackendError> {
        self.inner.get_catalogs(ctx)
    }

    fn get_schemas(
        &self,
        ctx: &ExecContext,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
    ) -> Result<BackendResult, BackendError> {
        self.inner.get_schemas(ctx, catalog, schema_pattern)
    }

    fn get_tables(
        &self,
        ctx: &ExecContext,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        table_types: &[String],
    ) -> Result<BackendResult, BackendError> {
        self.inner
            .get_tables(ctx, catalog, schema_pattern, table_pattern, table_types)
    }

    fn get_columns(
        &self,
        ctx: &ExecContext,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        column_pattern: Option<&str>,
    ) -> Result<BackendResult, BackendError> {
        self.inner
            .get_columns(ctx, catalog, schema_pattern, table_pattern, column_pattern)
    }

    fn get_functions(
        &self,
        ctx: &ExecContext,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        function_pattern: Option<&str>,
    ) -> Result<BackendResult, BackendError> {
        self.inner
            .get_functions(ctx, catalog, schema_pattern, function_pattern)
    }

    fn get_type_info(&self, ctx: &ExecContext) -> Result<BackendResult, BackendError> {
        self.inner.get_type_info(ctx)
    }

    fn get_table_types(&self, ctx: &ExecContext) -> Result<BackendResult, BackendError> {
        self.inner.get_table_types(ctx)
    }
}
