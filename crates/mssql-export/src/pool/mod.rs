//! Bounded pool of pre-opened, read-only export sessions.
//!
//! Sessions are opened eagerly at pool construction, configured for
//! `READ UNCOMMITTED` reads, and handed to wave workers via `acquire`.
//! Workers release by dropping the pooled handle; a handle whose session
//! broke is discarded rather than returned, so the pool may shrink.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{info, warn};

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};

/// Export session type.
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Pooled session handle; dropping it returns the session to the pool.
pub type PooledSession<'a> = PooledConnection<'a, ExportConnectionManager>;

/// Login timeout for new sessions.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// TCP keepalive interval.
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

fn build_tiberius_config(config: &ExportConfig) -> Config {
    let mut tib = Config::new();
    tib.host(&config.db_host);
    tib.port(config.db_port);
    tib.database(&config.db_name);
    tib.authentication(AuthMethod::sql_server(&config.db_user, &config.db_password));
    // encrypt=false / trustServerCertificate=true, per the connection contract
    tib.trust_cert();
    tib.encryption(EncryptionLevel::NotSupported);
    tib
}

/// Open a single configured export session.
///
/// Used for the primary introspection session and by the pool manager.
pub async fn open_session(config: &ExportConfig) -> Result<MssqlClient> {
    let tib = build_tiberius_config(config);

    let tcp = tokio::time::timeout(LOGIN_TIMEOUT, TcpStream::connect(tib.get_addr()))
        .await
        .map_err(|_| {
            ExportError::pool(
                format!("connect timed out after {:?}", LOGIN_TIMEOUT),
                "opening export session",
            )
        })??;
    tcp.set_nodelay(true).ok();

    // Keepalive setup consumes the stream; fall back to a plain reconnect
    // if the socket cannot be converted back.
    let tcp = match enable_keepalive(tcp) {
        Ok(tcp) => tcp,
        Err(e) => {
            warn!("Failed to configure TCP keepalives, reconnecting without: {}", e);
            let tcp = TcpStream::connect(tib.get_addr()).await?;
            tcp.set_nodelay(true).ok();
            tcp
        }
    };
    let mut client = Client::connect(tib, tcp.compat_write()).await?;

    // Sessions only read; dirty reads are accepted for throughput.
    client
        .simple_query("SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED")
        .await?
        .into_results()
        .await?;

    Ok(client)
}

/// Enable TCP keepalives so idle wave workers do not lose their sessions.
fn enable_keepalive(tcp: TcpStream) -> std::io::Result<TcpStream> {
    let std_tcp = tcp.into_std()?;
    let socket = socket2::Socket::from(std_tcp);

    let keepalive = socket2::TcpKeepalive::new()
        .with_time(TCP_KEEPALIVE_INTERVAL)
        .with_interval(TCP_KEEPALIVE_INTERVAL);
    if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
        warn!("Failed to set TCP keepalive on export session: {}", e);
    }

    let std_tcp: std::net::TcpStream = socket.into();
    std_tcp.set_nonblocking(true)?;
    TcpStream::from_std(std_tcp)
}

/// bb8 connection manager for export sessions.
pub struct ExportConnectionManager {
    config: ExportConfig,
}

#[async_trait]
impl bb8::ManageConnection for ExportConnectionManager {
    type Connection = MssqlClient;
    type Error = ExportError;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        open_session(&self.config).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Fixed-size pool of export sessions.
pub struct SessionPool {
    pool: Pool<ExportConnectionManager>,
    size: usize,
}

impl SessionPool {
    /// Open `size` sessions eagerly and verify one of them.
    ///
    /// Acquire does not re-validate sessions; waiters are served in FIFO
    /// order by the underlying pool.
    pub async fn connect(config: &ExportConfig, size: usize) -> Result<Self> {
        info!("Initializing connection pool with {} sessions...", size);

        let manager = ExportConnectionManager {
            config: config.clone(),
        };
        let pool = Pool::builder()
            .max_size(size as u32)
            .min_idle(Some(size as u32))
            .connection_timeout(LOGIN_TIMEOUT)
            .test_on_check_out(false)
            .build(manager)
            .await
            .map_err(|e| ExportError::pool(e, "creating export session pool"))?;

        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| ExportError::pool(e, "testing pooled session"))?;
            conn.simple_query("SELECT 1").await?.into_row().await?;
        }

        info!("Connection pool initialized ({} sessions)", size);
        Ok(Self { pool, size })
    }

    /// Acquire a session, blocking until one is free.
    pub async fn acquire(&self) -> Result<PooledSession<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| ExportError::pool(e, "acquiring session from pool"))
    }

    /// Pool capacity.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Close all sessions. bb8 drops them on pool drop; this is the
    /// explicit shutdown point at the end of a run.
    pub async fn close(&self) {
        info!("Shutting down connection pool");
    }
}
