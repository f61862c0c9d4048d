use crate::cql::codec::{Frame, Request};
use crate::cql::opcode::Opcode;
use crate::cql::result::{parse_result, QueryResult};
use crate::cql::statement::{encode_bound_values, Batch, BoundValues, PreparedStatement};
use crate::cql::{Consistency, CQL_VERSION_KEY, CQL_VERSION_VALUE};
use crate::error::{CqlError, Result};
use crate::serde::writer::{put_long_string, put_string, put_string_map};
use crate::transport::{self, Transport};
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Stream id for pipelined EXECUTEs. Responses are correlated by arrival
/// order, not by stream id, so one id is enough.
const ASYNC_STREAM_ID: u16 = 1;

/// Connection settings. A `p:` prefix on the host requests a persistent
/// transport, reused across sessions to the same `host:port`.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub keyspace: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub retries: u32,
    /// Return BLOB columns as raw bytes instead of `0x`-hex text.
    pub raw_blobs: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 9042,
            user: String::new(),
            password: String::new(),
            keyspace: String::new(),
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(120),
            retries: 3,
            raw_blobs: false,
        }
    }
}

/// One logical connection to a node. Owns its transport exclusively; all
/// operations are serial. Asynchronous behavior is limited to pipelining
/// EXECUTE requests, drained in send order by `read_async`.
pub struct Session {
    transport: Option<Transport>,
    connect_timeout: Duration,
    read_timeout: Duration,
    raw_blobs: bool,
    async_requests: u32,
    warnings: Vec<String>,
    last_frame: Bytes,
}

impl Session {
    /// Connects to a node, retrying with a randomized 1-2s backoff between
    /// attempts. The last connection error is re-raised once every attempt
    /// is exhausted.
    pub async fn connect(config: Config) -> Result<Session> {
        let mut last_err = None;

        for attempt in 1..=config.retries {
            match Session::connect_once(&config).await {
                Ok(session) => return Ok(session),
                Err(err) => {
                    tracing::warn!(host = %config.host, attempt, %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
            if attempt < config.retries {
                let backoff = rand::thread_rng().gen_range(1000..=2000);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }

        Err(last_err
            .unwrap_or_else(|| CqlError::protocol("every connection attempt failed")))
    }

    async fn connect_once(config: &Config) -> Result<Session> {
        let (host, persistent) = match config.host.strip_prefix("p:") {
            Some(host) => (host, true),
            None => (config.host.as_str(), false),
        };

        let transport = match persistent
            .then(|| transport::checkout(host, config.port))
            .flatten()
        {
            Some(parked) => parked,
            None => Transport::open(host, config.port, config.connect_timeout, persistent).await?,
        };

        Session::establish(transport, config).await
    }

    /// Handshakes a fresh transport (reused persistent transports skip it
    /// entirely) and selects the configured keyspace.
    async fn establish(transport: Transport, config: &Config) -> Result<Session> {
        let fresh = transport.is_fresh();
        let mut session = Session {
            transport: Some(transport),
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            raw_blobs: config.raw_blobs,
            async_requests: 0,
            warnings: Vec::new(),
            last_frame: Bytes::new(),
        };

        if fresh {
            session.handshake(config).await?;
        }

        if !config.keyspace.is_empty() {
            session.use_keyspace(&config.keyspace).await?;
        }

        Ok(session)
    }

    /// STARTUP -> (AUTHENTICATE -> CREDENTIALS ->) READY, all under the
    /// connect timeout; the steady-state read timeout applies afterward.
    async fn handshake(&mut self, config: &Config) -> Result<()> {
        let mut body = BytesMut::new();
        put_string_map!(body, [(CQL_VERSION_KEY, CQL_VERSION_VALUE)]);
        self.send(Request::new(Opcode::Startup, body.freeze())).await?;

        let mut frame = self.recv(self.connect_timeout).await?;

        if frame.opcode == Opcode::Authenticate {
            let mut body = BytesMut::new();
            body.put_u16(2);
            put_string!(body, "username");
            put_string!(body, config.user.as_str());
            put_string!(body, "password");
            put_string!(body, config.password.as_str());
            self.send(Request::new(Opcode::Credentials, body.freeze())).await?;

            frame = self.recv(self.connect_timeout).await?;
        }

        if frame.opcode != Opcode::Ready {
            self.close(true);
            return Err(CqlError::Protocol(format!(
                "expected READY during handshake, got {:?}",
                frame.opcode
            )));
        }

        if let Some(transport) = self.transport.as_mut() {
            transport.mark_established();
        }
        tracing::debug!("session ready");
        Ok(())
    }

    async fn use_keyspace(&mut self, keyspace: &str) -> Result<()> {
        match self.query(&format!("USE {keyspace}"), Consistency::default()).await? {
            QueryResult::SetKeyspace(ks) if ks == keyspace => Ok(()),
            other => {
                self.close(true);
                Err(CqlError::Protocol(format!(
                    "USE {keyspace} was not confirmed: {other:?}"
                )))
            }
        }
    }

    /// Runs one CQL query and returns its decoded result.
    pub async fn query(&mut self, cql: &str, consistency: Consistency) -> Result<QueryResult> {
        self.ensure_no_pending("query")?;

        let mut body = BytesMut::new();
        put_long_string!(body, cql);
        body.put_u16(consistency.to_wire());
        body.put_u8(0); // no query flags

        self.request_result(Opcode::Query, body.freeze()).await
    }

    /// Prepares a statement, returning its id and parameter metadata.
    pub async fn prepare(&mut self, cql: &str) -> Result<PreparedStatement> {
        self.ensure_no_pending("prepare")?;

        let mut body = BytesMut::new();
        put_long_string!(body, cql);

        match self.request_result(Opcode::Prepare, body.freeze()).await? {
            QueryResult::Prepared(stmt) => Ok(stmt),
            other => {
                self.close(true);
                Err(CqlError::Protocol(format!(
                    "PREPARE did not return a prepared statement: {other:?}"
                )))
            }
        }
    }

    /// Executes a prepared statement and waits for its result.
    pub async fn execute(
        &mut self,
        stmt: &PreparedStatement,
        values: &BoundValues,
        consistency: Consistency,
    ) -> Result<QueryResult> {
        self.ensure_no_pending("execute")?;
        let body = execute_body(stmt, values, consistency)?;
        self.request_result(Opcode::Execute, body).await
    }

    /// Pipelines an EXECUTE without waiting for its response. Drain with
    /// `read_async` before issuing any synchronous call.
    pub async fn execute_async(
        &mut self,
        stmt: &PreparedStatement,
        values: &BoundValues,
        consistency: Consistency,
    ) -> Result<()> {
        let body = execute_body(stmt, values, consistency)?;
        self.send(Request::with_stream(Opcode::Execute, body, ASYNC_STREAM_ID))
            .await?;
        self.async_requests += 1;
        Ok(())
    }

    /// Reads every pending pipelined response, in the order the requests
    /// were sent, and returns the decoded results.
    pub async fn read_async(&mut self) -> Result<Vec<QueryResult>> {
        let mut results = Vec::with_capacity(self.async_requests as usize);

        while self.async_requests > 0 {
            let frame = self.recv(self.read_timeout).await?;
            results.push(self.expect_result(frame)?);
            self.async_requests -= 1;
        }

        Ok(results)
    }

    /// Submits an accumulated batch as one BATCH frame.
    pub async fn batch(&mut self, batch: &Batch, consistency: Consistency) -> Result<QueryResult> {
        self.ensure_no_pending("batch")?;

        let mut body = BytesMut::new();
        body.extend_from_slice(&batch.get_data());
        body.put_u16(consistency.to_wire());
        body.put_u8(0); // no batch flags

        self.request_result(Opcode::Batch, body.freeze()).await
    }

    /// Closes the session. A persistent transport is parked for reuse by a
    /// future session unless `force_persistent` is set.
    pub fn close(&mut self, force_persistent: bool) {
        if let Some(transport) = self.transport.take() {
            if transport.is_persistent() && !force_persistent {
                transport::park(transport);
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Warnings attached to the most recently received frame.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Raw image of the most recently received frame, for diagnostics.
    pub fn last_frame(&self) -> &[u8] {
        &self.last_frame
    }

    pub fn pending_async(&self) -> u32 {
        self.async_requests
    }

    fn ensure_no_pending(&self, operation: &str) -> Result<()> {
        if self.async_requests > 0 {
            return Err(CqlError::Usage(format!(
                "cannot {operation} while {} async requests are pending; call read_async() first",
                self.async_requests
            )));
        }
        Ok(())
    }

    async fn request_result(&mut self, opcode: Opcode, body: Bytes) -> Result<QueryResult> {
        self.send(Request::new(opcode, body)).await?;
        let frame = self.recv(self.read_timeout).await?;
        self.expect_result(frame)
    }

    fn expect_result(&mut self, frame: Frame) -> Result<QueryResult> {
        if frame.opcode != Opcode::Result {
            self.close(true);
            return Err(CqlError::Protocol(format!(
                "unexpected opcode {:?}, wanted RESULT",
                frame.opcode
            )));
        }
        match parse_result(frame.body, self.raw_blobs) {
            Ok(result) => Ok(result),
            Err(err) => {
                self.close(true);
                Err(err)
            }
        }
    }

    async fn send(&mut self, request: Request) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(CqlError::Closed)?;
        match transport.send(request).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.close(true);
                Err(err)
            }
        }
    }

    async fn recv(&mut self, timeout: Duration) -> Result<Frame> {
        let transport = self.transport.as_mut().ok_or(CqlError::Closed)?;
        match transport.recv(timeout).await {
            Ok(frame) => {
                // Recorded even for ERROR frames, so the diagnostic
                // accessors cover failed exchanges too.
                self.warnings = frame.warnings.clone();
                self.last_frame = frame.raw.clone();

                if frame.opcode == Opcode::Error {
                    self.close(true);
                    return Err(frame.server_error());
                }
                Ok(frame)
            }
            Err(err) => {
                self.close(true);
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.transport.is_some())
            .field("pending_async", &self.async_requests)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Parks persistent transports; ephemeral sockets close with the
        // session. Pending async responses are abandoned.
        self.close(false);
    }
}

/// EXECUTE body: `<short bytes id><consistency><flags=VALUES><n><values>`.
fn execute_body(
    stmt: &PreparedStatement,
    values: &BoundValues,
    consistency: Consistency,
) -> Result<Bytes> {
    let mut body = BytesMut::new();
    body.put_u16(stmt.id().len() as u16);
    body.extend_from_slice(stmt.id());
    body.put_u16(consistency.to_wire());
    body.put_u8(0x01); // values follow
    encode_bound_values(&mut body, stmt, values)?;
    Ok(body.freeze())
}
