//! Shared key-value service backend
//!
//! A line-oriented TCP protocol against a small in-memory KV daemon:
//!
//! ```text
//! SET <key> <len>\n<len bytes>     ->  OK\n
//! GET <key>\n                      ->  VALUE <len>\n<len bytes>  |  NONE\n
//! DEL <key>\n                      ->  OK\n
//! ```
//!
//! Each operation opens a fresh connection; the daemon is local, the
//! payload is one snapshot, and connection reuse is not worth the state.
//! Availability is probed once at startup with a bounded connect.

use std::time::Duration;

use hearth_core::{Error, Result, Snapshot};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::SnapshotBackend;

const SNAPSHOT_KEY: &str = "hearth:snapshot";
const MAX_PAYLOAD: usize = 1 << 20;

pub struct KvBackend {
    addr: String,
}

impl KvBackend {
    /// Bounded connect; success means the service is reachable and this
    /// backend wins the probe.
    pub async fn probe(addr: &str, timeout: Duration) -> Result<Self> {
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => Ok(Self {
                addr: addr.to_string(),
            }),
            Ok(Err(e)) => Err(Error::StoreUnavailable(format!("kv connect: {e}"))),
            Err(_) => Err(Error::StoreUnavailable(format!(
                "kv probe timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        TcpStream::connect(&self.addr)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("kv connect: {e}")))
    }
}

#[async_trait::async_trait]
impl SnapshotBackend for KvBackend {
    async fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let payload = serde_json::to_vec(snapshot)?;
        let mut stream = self.connect().await?;
        let header = format!("SET {} {}\n", SNAPSHOT_KEY, payload.len());
        stream
            .write_all(header.as_bytes())
            .await
            .map_err(|e| Error::store_write(e.to_string()))?;
        stream
            .write_all(&payload)
            .await
            .map_err(|e| Error::store_write(e.to_string()))?;
        expect_line(&mut stream, "OK").await
    }

    async fn read(&self) -> Result<Option<Snapshot>> {
        let mut stream = self.connect().await?;
        stream
            .write_all(format!("GET {SNAPSHOT_KEY}\n").as_bytes())
            .await
            .map_err(|e| Error::store_read(e.to_string()))?;

        let mut reader = BufReader::new(stream);
        let line = read_line(&mut reader).await?;
        if line == "NONE" {
            return Ok(None);
        }
        let len = line
            .strip_prefix("VALUE ")
            .and_then(|l| l.trim().parse::<usize>().ok())
            .ok_or_else(|| Error::store_read(format!("bad kv response: {line:?}")))?;
        if len > MAX_PAYLOAD {
            return Err(Error::store_read(format!("kv payload too large: {len}")));
        }
        let mut payload = vec![0u8; len];
        reader
            .read_exact(&mut payload)
            .await
            .map_err(|e| Error::store_read(e.to_string()))?;

        match serde_json::from_slice::<Snapshot>(&payload) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!("discarding unparseable kv snapshot: {e}");
                Ok(None)
            }
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut stream = self.connect().await?;
        stream
            .write_all(format!("DEL {SNAPSHOT_KEY}\n").as_bytes())
            .await
            .map_err(|e| Error::store_write(e.to_string()))?;
        expect_line(&mut stream, "OK").await
    }

    fn name(&self) -> &'static str {
        "kv"
    }
}

async fn expect_line(stream: &mut TcpStream, expected: &str) -> Result<()> {
    let mut reader = BufReader::new(stream);
    let line = read_line(&mut reader).await?;
    if line == expected {
        Ok(())
    } else {
        Err(Error::store_write(format!(
            "kv responded {line:?}, expected {expected:?}"
        )))
    }
}

async fn read_line<R: tokio::io::AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Result<String> {
    use tokio::io::AsyncBufReadExt;
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| Error::store_read(e.to_string()))?;
    Ok(line.trim_end().to_string())
}
