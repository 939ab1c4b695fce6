// packages/agent/src/control/stdio.rs
//! Newline-delimited JSON transport
//!
//! Each input line is a JSON array of intercept requests (one snapshot);
//! each output line is one decision report. Blank input lines are ignored.

use crate::interception::{DecisionReport, InterceptRequest};
use crate::utils::errors::{AgentError, Result};
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// Longest snapshot line accepted (bytes)
const MAX_LINE_LENGTH: usize = 1 << 20;

/// Decode snapshots from `reader`, one per line
pub fn snapshots<R>(reader: R) -> impl Stream<Item = Result<Vec<InterceptRequest>>>
where
    R: AsyncRead,
{
    FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)).filter_map(
        |line| {
            future::ready(match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(
                    serde_json::from_str::<Vec<InterceptRequest>>(&line).map_err(AgentError::from),
                ),
                Err(e) => Some(Err(AgentError::ControlPlane(e.to_string()))),
            })
        },
    )
}

/// Encode reports to `writer`, one per line
pub fn reports<W>(writer: W) -> impl Sink<DecisionReport, Error = AgentError>
where
    W: AsyncWrite,
{
    let framed = FramedWrite::new(writer, LinesCodec::new());

    SinkExt::<String>::sink_map_err(framed, |e: LinesCodecError| {
        AgentError::ControlPlane(e.to_string())
    })
    .with(|report: DecisionReport| {
        future::ready(serde_json::to_string(&report).map_err(AgentError::from))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::reconciler;
    use crate::interception::{Arbitrator, Disposition, Forwarder, ForwarderTarget};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_snapshot_lines_decode() {
        let input = concat!(
            "[]\n",
            "\n",
            r#"[{"id":"intercept-01","disposition":"WAITING"},{"id":"intercept-02","disposition":"NO_CLIENT"}]"#,
            "\n",
            "not json\n",
        );

        let decoded: Vec<_> = snapshots(input.as_bytes()).collect().await;
        assert_eq!(decoded.len(), 3);
        assert!(decoded[0].as_ref().unwrap().is_empty());

        let second = decoded[1].as_ref().unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].disposition, Disposition::Waiting);
        assert_eq!(second[1].disposition, Disposition::NoClient);

        assert!(matches!(decoded[2], Err(AgentError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_reports_are_written_as_lines() {
        let (writer, mut reader) = tokio::io::duplex(4096);

        let mut sink = Box::pin(reports(writer));
        sink.send(DecisionReport::admitted("intercept-01")).await.unwrap();
        sink.send(DecisionReport::rejected("intercept-02", "busy"))
            .await
            .unwrap();
        drop(sink);

        let mut output = String::new();
        reader.read_to_string(&mut output).await.unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"id":"intercept-01","disposition":"ACTIVE"}"#,
                r#"{"id":"intercept-02","disposition":"AGENT_ERROR","message":"busy"}"#,
            ]
        );
    }

    #[tokio::test]
    async fn test_reconcile_over_stdio() {
        let forwarder = Arc::new(Forwarder::new("127.0.0.1:0".parse().unwrap()));
        let arbitrator = Arbitrator::new(
            Arc::clone(&forwarder),
            "managerHost",
            ForwarderTarget::new("appHost", 5000),
        );

        let input = concat!(
            r#"[{"id":"intercept-01","disposition":"ACTIVE","destination_port":1138},"#,
            r#"{"id":"intercept-02","disposition":"WAITING"}]"#,
            "\n",
        );
        let (writer, mut reader) = tokio::io::duplex(4096);

        let stats = reconciler::run(
            &arbitrator,
            snapshots(input.as_bytes()),
            reports(writer),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.reports_sent, 1);

        let mut output = String::new();
        reader.read_to_string(&mut output).await.unwrap();
        assert_eq!(
            output.trim_end(),
            r#"{"id":"intercept-02","disposition":"AGENT_ERROR","message":"Conflicts with the currently-served intercept \"intercept-01\""}"#
        );
    }
}
