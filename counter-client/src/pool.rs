//! # Connection Pool
//!
//! Reuse TCP connections to a single backend shard to avoid paying a
//! handshake per call. Connections are async (`tokio::net::TcpStream`);
//! the idle-connection bookkeeping itself stays synchronous (a plain
//! `std::sync::Mutex`) since it is only ever held across pointer moves,
//! never across an `.await`.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: keep a bounded set of reusable connections.
//! 2. **Minimal Locking**: hold the mutex only while moving idle connections.
//! 3. **Fail Fast**: exceeding the pool limit returns an error immediately.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{ClientError, ClientResult};
use crate::resp::{encode_command, read_response, RespValue};

/// Pool configuration for one shard's connections.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Shard address, e.g. `"127.0.0.1:6379"`.
    pub addr: String,
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// Per-call timeout applied to the request/response round trip.
    pub call_timeout: Option<Duration>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
}

struct PoolState {
    idle: VecDeque<Connection>,
    total: usize,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

/// Connection pool handle; cheap to clone, shares the underlying state.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        let state = PoolState {
            idle: VecDeque::with_capacity(config.max_idle),
            total: 0,
        };
        ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(state),
            }),
        }
    }

    /// Acquires a connection, reusing an idle one or opening a fresh one
    /// within the pool's capacity.
    pub async fn acquire(&self) -> ClientResult<PooledConnection> {
        if let Some(conn) = self.pop_idle() {
            return Ok(PooledConnection::new(self.inner.clone(), conn));
        }

        if !self.try_reserve() {
            return Err(ClientError::PoolExhausted);
        }

        match Connection::connect(&self.inner.config).await {
            Ok(conn) => Ok(PooledConnection::new(self.inner.clone(), conn)),
            Err(err) => {
                self.release_slot();
                Err(err)
            }
        }
    }

    fn pop_idle(&self) -> Option<Connection> {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.idle.pop_front()
    }

    fn try_reserve(&self) -> bool {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        if state.total >= self.inner.config.max_total {
            return false;
        }
        state.total += 1;
        true
    }

    fn release_slot(&self) {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.total = state.total.saturating_sub(1);
    }

    fn return_connection(&self, conn: Connection) {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        if state.idle.len() < self.inner.config.max_idle {
            state.idle.push_back(conn);
        } else {
            state.total = state.total.saturating_sub(1);
        }
    }
}

/// RAII wrapper returning a connection to the pool on drop.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    conn: Option<Connection>,
    valid: bool,
}

impl PooledConnection {
    fn new(pool: Arc<PoolInner>, conn: Connection) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            valid: true,
        }
    }

    /// Executes a RESP command and returns the parsed response, bounded by
    /// the pool's configured call timeout when set.
    pub async fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        let conn = self.conn.as_mut().expect("connection exists");
        let timeout = self.pool.config.call_timeout;
        let result = match timeout {
            Some(bound) => match tokio::time::timeout(bound, conn.exec(args)).await {
                Ok(result) => result,
                Err(_) => Err(ClientError::Timeout),
            },
            None => conn.exec(args).await,
        };

        if result.is_err() {
            // Don't return a connection that may be mid-frame back to the pool.
            self.valid = false;
        }
        result
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return,
        };

        let pool = ConnectionPool {
            inner: self.pool.clone(),
        };

        if self.valid {
            pool.return_connection(conn);
        } else {
            pool.release_slot();
        }
    }
}

/// Single TCP connection with reusable buffers.
struct Connection {
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl Connection {
    async fn connect(config: &PoolConfig) -> ClientResult<Self> {
        let stream = connect_stream(config).await?;
        stream.set_nodelay(true)?;

        Ok(Connection {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
        })
    }

    async fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        self.reader.get_mut().write_all(&self.write_buf).await?;
        self.reader.get_mut().flush().await?;

        read_response(&mut self.reader, &mut self.line_buf).await
    }
}

async fn connect_stream(config: &PoolConfig) -> ClientResult<TcpStream> {
    let connect = TcpStream::connect(&config.addr);
    let stream = match config.connect_timeout {
        Some(bound) => tokio::time::timeout(bound, connect)
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(|_| ClientError::InvalidAddress)?,
        None => connect.await.map_err(|_| ClientError::InvalidAddress)?,
    };
    Ok(stream)
}
