// src/replay.rs
// Feed a captured response body through the assembler offline

use std::convert::Infallible;
use std::path::Path;

use anyhow::{Context, Result};
use futures::stream;
use tracing::info;

use crate::stream::{SnapshotSink, StreamController, StreamOutcome};

/// Split `body` into fixed-size chunks regardless of character boundaries
pub fn chunk_body(body: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    body.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect()
}

pub async fn replay_bytes<K>(
    controller: StreamController,
    body: &[u8],
    chunk_size: usize,
    sink: &mut K,
) -> StreamOutcome
where
    K: SnapshotSink + ?Sized,
{
    let chunks = chunk_body(body, chunk_size);
    info!("Replaying {} bytes as {} chunk(s) in {} mode", body.len(), chunks.len(), controller.mode());

    let source = stream::iter(chunks.into_iter().map(Ok::<_, Infallible>));
    controller.run(source, sink).await
}

pub async fn replay_file<K>(
    controller: StreamController,
    path: &Path,
    chunk_size: usize,
    sink: &mut K,
) -> Result<StreamOutcome>
where
    K: SnapshotSink + ?Sized,
{
    let body = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read captured body {}", path.display()))?;
    Ok(replay_bytes(controller, &body, chunk_size, sink).await)
}
