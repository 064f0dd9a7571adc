//! JSON-lines server
//!
//! Each request runs on its own task with a context derived from the server
//! token; a single writer task owns the output. On EOF the server stops
//! reading, waits for in-flight requests and flushes their responses.

use crate::protocol::{Envelope, Request, Response};
use crate::provider::Provider;
use scw_core::{Context, Diagnostic};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

async fn write_responses<W>(mut output: W, mut rx: mpsc::UnboundedReceiver<Response>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(resp) = rx.recv().await {
        let mut line = serde_json::to_vec(&resp)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(())
}

/// Queue `resp` for the writer, logging it when the writer is gone
fn reply(tx: &mpsc::UnboundedSender<Response>, resp: Response) -> bool {
    let seq = resp.seq;
    let sent = tx.send(resp).is_ok();
    if !sent {
        tracing::error!(seq, "response dropped, writer is gone");
    }
    sent
}

/// `seq` of a line that failed to decode, when it has one
fn salvage_seq(line: &str) -> u64 {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|v| v.get("seq").and_then(serde_json::Value::as_u64))
        .unwrap_or_default()
}

pub async fn serve<R, W>(
    provider: Arc<Provider>,
    input: R,
    output: W,
    shutdown: CancellationToken,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_responses(output, rx));
    let mut lines = BufReader::new(input).lines();
    let mut tasks = JoinSet::new();

    tracing::info!("serving host requests");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let env: Envelope = match serde_json::from_str(&line) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed request");
                        let diag = Diagnostic::error("Malformed request").with_detail(e.to_string());
                        let seq = salvage_seq(&line);
                        reply(&tx, Response::diagnostics(diag.into()).with_seq(seq));
                        continue;
                    }
                };
                let seq = env.seq;
                if matches!(env.request, Request::Stop) {
                    tracing::info!(seq, "stop requested, cancelling in-flight requests");
                    shutdown.cancel();
                    reply(&tx, Response::default().with_seq(seq));
                    continue;
                }
                let provider = provider.clone();
                let tx = tx.clone();
                let ctx = Context::with_token(shutdown.child_token());
                tasks.spawn(async move {
                    let resp = provider.handle(env.request, &ctx).await.with_seq(seq);
                    reply(&tx, resp);
                });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "request task failed");
                }
            }
        }
    }

    tracing::debug!(in_flight = tasks.len(), "input closed, draining");
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "request task failed");
        }
    }
    drop(tx);
    match writer.await {
        Ok(result) => result,
        Err(e) => Err(io::Error::other(e)),
    }
}

/// [`serve`] over the process stdin and stdout
pub async fn serve_stdio(provider: Arc<Provider>) -> io::Result<()> {
    serve(
        provider,
        tokio::io::stdin(),
        tokio::io::stdout(),
        CancellationToken::new(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Meta;
    use scw_api::fake::FakeCloud;
    use scw_core::{Region, Zone};
    use serde_json::{Value as Json, json};

    fn provider() -> Arc<Provider> {
        let zone: Zone = "fr-par-1".parse().unwrap();
        let region: Region = "fr-par".parse().unwrap();
        Arc::new(Provider::with_meta(Meta::new(
            Arc::new(FakeCloud::new()),
            zone,
            region,
        )))
    }

    async fn run(input: &str) -> Vec<Json> {
        let (mut client, server_out) = tokio::io::duplex(1 << 20);
        serve(
            provider(),
            input.as_bytes(),
            server_out,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let mut out = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut client, &mut out)
            .await
            .unwrap();
        out.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_every_request_gets_its_seq() {
        let input = [
            json!({"seq": 1, "method": "GetProviderSchema"}),
            json!({"seq": 2, "method": "Validate", "type_name": "scaleway_iam_ssh_key", "config": {}}),
        ]
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\n");
        let mut seqs: Vec<u64> = run(&input)
            .await
            .iter()
            .map(|r| r["seq"].as_u64().unwrap())
            .collect();
        seqs.sort();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_malformed_line_is_answered() {
        let out = run("{\"seq\": 9, \"method\": \"Teleport\"}\n").await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["seq"], json!(9));
        assert_eq!(out[0]["diagnostics"][0]["summary"], json!("Malformed request"));
    }

    #[test]
    fn test_reply_reports_closed_writer() {
        let (tx, rx) = mpsc::unbounded_channel();
        assert!(reply(&tx, Response::default().with_seq(1)));
        drop(rx);
        assert!(!reply(&tx, Response::default().with_seq(2)));
    }

    #[tokio::test]
    async fn test_stop_cancels_token() {
        let token = CancellationToken::new();
        let (_client, server_out) = tokio::io::duplex(4096);
        serve(
            provider(),
            &b"{\"seq\": 1, \"method\": \"Stop\"}\n"[..],
            server_out,
            token.clone(),
        )
        .await
        .unwrap();
        assert!(token.is_cancelled());
    }
}
