//! # Call Orchestration
//!
//! Drives the exchange that matches a resolved RPC's streaming shape:
//!
//! * **Unary**: fill one request, invoke, present the response.
//! * **Client streaming**: fill and send requests until the filler reports end of input,
//!   then close the request side and present the single response.
//! * **Server streaming**: fill and send one request, then present every response until
//!   the server ends the stream.
//! * **Bidirectional**: a send future (fill/send until end of input, then close) and a
//!   receive future (receive/present until the stream ends) run concurrently and are
//!   joined with `tokio::try_join!`, so the first failure wins.
//!
//! Requests are filled on the blocking thread pool because fillers read from blocking
//! input sources such as a terminal.
//!
//! ## Cancellation
//!
//! Every transport wait runs under the caller's `CancellationToken`. Cancellation, either
//! through the token or as a `Cancelled` status from the transport, ends the call
//! cleanly without an error.
pub mod transport;

use crate::{
    descriptor::{RpcDescriptor, RpcShape, SourceError},
    fill::{Fill, FillError, FillOutcome},
    header::HeaderError,
    present::{PresentError, Presenter},
};
use prost_reflect::{DynamicMessage, MessageDescriptor};
use std::{future::Future, io::Write, sync::Arc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tonic::{Code, Status, metadata::MetadataMap};
use transport::{Client, ClientStream, StreamReceiver, StreamSender};

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Resolve(#[from] SourceError),
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("Failed to build a request for '{rpc}': {source}")]
    Fill {
        rpc: String,
        #[source]
        source: FillError,
    },
    #[error("Request input task failed: {0}")]
    FillTask(#[from] tokio::task::JoinError),
    #[error("Failed to call RPC '{rpc}': {source}")]
    Transport {
        rpc: String,
        #[source]
        source: Status,
    },
    #[error("Failed to format response: {0}")]
    Present(#[from] PresentError),
    #[error("Failed to write response: {0}")]
    Output(#[from] std::io::Error),
}

/// Everything a single call borrows from its session.
pub struct CallContext<'a, C, F, P> {
    pub client: &'a mut C,
    pub filler: &'a Arc<Mutex<F>>,
    pub presenter: &'a P,
    pub metadata: MetadataMap,
    pub token: &'a CancellationToken,
}

/// Performs `rpc`, writing every formatted response to `out`.
pub async fn call_rpc<C, F, P, W>(
    ctx: CallContext<'_, C, F, P>,
    rpc: &RpcDescriptor,
    out: &mut W,
) -> Result<(), CallError>
where
    C: Client,
    F: Fill + Send + 'static,
    P: Presenter,
    W: Write,
{
    tracing::debug!(
        rpc = rpc.fully_qualified_name(),
        shape = ?rpc.shape(),
        "calling RPC"
    );

    match rpc.shape() {
        RpcShape::Unary => unary(ctx, rpc, out).await,
        RpcShape::ClientStreaming => client_streaming(ctx, rpc, out).await,
        RpcShape::ServerStreaming => server_streaming(ctx, rpc, out).await,
        RpcShape::Bidirectional => bidirectional(ctx, rpc, out).await,
    }
}

async fn unary<C, F, P, W>(
    ctx: CallContext<'_, C, F, P>,
    rpc: &RpcDescriptor,
    out: &mut W,
) -> Result<(), CallError>
where
    C: Client,
    F: Fill + Send + 'static,
    P: Presenter,
    W: Write,
{
    let Some((_, request)) = next_request(ctx.filler, rpc, ctx.token).await? else {
        return Ok(());
    };

    let invocation = ctx.client.invoke(rpc, ctx.metadata, request);
    let Some(response) = guarded(ctx.token, rpc, invocation).await? else {
        return Ok(());
    };

    write_response(ctx.presenter, out, &response)
}

async fn client_streaming<C, F, P, W>(
    ctx: CallContext<'_, C, F, P>,
    rpc: &RpcDescriptor,
    out: &mut W,
) -> Result<(), CallError>
where
    C: Client,
    F: Fill + Send + 'static,
    P: Presenter,
    W: Write,
{
    let open = ctx.client.open_client_stream(rpc, ctx.metadata);
    let Some(mut stream) = guarded(ctx.token, rpc, open).await? else {
        return Ok(());
    };

    loop {
        let Some((outcome, request)) = next_request(ctx.filler, rpc, ctx.token).await? else {
            return Ok(());
        };

        if outcome == FillOutcome::EndOfInput {
            let Some(response) = guarded(ctx.token, rpc, stream.close_and_receive()).await? else {
                return Ok(());
            };
            return write_response(ctx.presenter, out, &response);
        }

        if guarded(ctx.token, rpc, stream.send(request)).await?.is_none() {
            return Ok(());
        }
    }
}

async fn server_streaming<C, F, P, W>(
    ctx: CallContext<'_, C, F, P>,
    rpc: &RpcDescriptor,
    out: &mut W,
) -> Result<(), CallError>
where
    C: Client,
    F: Fill + Send + 'static,
    P: Presenter,
    W: Write,
{
    let Some((_, request)) = next_request(ctx.filler, rpc, ctx.token).await? else {
        return Ok(());
    };

    let open = ctx.client.open_server_stream(rpc, ctx.metadata, request);
    let Some(mut stream) = guarded(ctx.token, rpc, open).await? else {
        return Ok(());
    };

    receive_all(&mut stream, ctx.presenter, out, ctx.token, rpc).await
}

async fn bidirectional<C, F, P, W>(
    ctx: CallContext<'_, C, F, P>,
    rpc: &RpcDescriptor,
    out: &mut W,
) -> Result<(), CallError>
where
    C: Client,
    F: Fill + Send + 'static,
    P: Presenter,
    W: Write,
{
    let open = ctx.client.open_bidi_stream(rpc, ctx.metadata);
    let Some((sender, mut receiver)) = guarded(ctx.token, rpc, open).await? else {
        return Ok(());
    };

    let send = send_all(sender, ctx.filler, rpc, ctx.token);
    let receive = receive_all(&mut receiver, ctx.presenter, out, ctx.token, rpc);

    tokio::try_join!(send, receive)?;
    Ok(())
}

async fn send_all<S, F>(
    mut sender: S,
    filler: &Arc<Mutex<F>>,
    rpc: &RpcDescriptor,
    token: &CancellationToken,
) -> Result<(), CallError>
where
    S: StreamSender,
    F: Fill + Send + 'static,
{
    loop {
        let Some((outcome, request)) = next_request(filler, rpc, token).await? else {
            return Ok(());
        };

        if outcome == FillOutcome::EndOfInput {
            guarded(token, rpc, sender.close_send()).await?;
            return Ok(());
        }

        if guarded(token, rpc, sender.send(request)).await?.is_none() {
            return Ok(());
        }
    }
}

async fn receive_all<R, P, W>(
    receiver: &mut R,
    presenter: &P,
    out: &mut W,
    token: &CancellationToken,
    rpc: &RpcDescriptor,
) -> Result<(), CallError>
where
    R: StreamReceiver,
    P: Presenter,
    W: Write,
{
    while let Some(Some(response)) = guarded(token, rpc, receiver.receive()).await? {
        write_response(presenter, out, &response)?;
    }
    Ok(())
}

/// Builds the next request on the blocking pool.
///
/// `None` means the call was cancelled while waiting for input.
async fn next_request<F>(
    filler: &Arc<Mutex<F>>,
    rpc: &RpcDescriptor,
    token: &CancellationToken,
) -> Result<Option<(FillOutcome, DynamicMessage)>, CallError>
where
    F: Fill + Send + 'static,
{
    let filler = Arc::clone(filler);
    let request_type: MessageDescriptor = rpc.request_type();

    let task = tokio::task::spawn_blocking(move || {
        let mut request = DynamicMessage::new(request_type);
        let outcome = filler.blocking_lock().fill(&mut request)?;
        Ok::<_, FillError>((outcome, request))
    });

    let Some(joined) = token.run_until_cancelled(task).await else {
        return Ok(None);
    };

    let (outcome, request) = joined?.map_err(|source| CallError::Fill {
        rpc: rpc.fully_qualified_name().to_string(),
        source,
    })?;
    tracing::debug!(?outcome, "request built");

    Ok(Some((outcome, request)))
}

/// Waits for a transport operation under the call's cancellation token.
///
/// `Ok(None)` means the call was cancelled.
async fn guarded<T>(
    token: &CancellationToken,
    rpc: &RpcDescriptor,
    operation: impl Future<Output = Result<T, Status>>,
) -> Result<Option<T>, CallError> {
    match token.run_until_cancelled(operation).await {
        None => Ok(None),
        Some(Ok(value)) => Ok(Some(value)),
        Some(Err(status)) if status.code() == Code::Cancelled => Ok(None),
        Some(Err(source)) => Err(CallError::Transport {
            rpc: rpc.fully_qualified_name().to_string(),
            source,
        }),
    }
}

fn write_response<P: Presenter, W: Write>(
    presenter: &P,
    out: &mut W,
    response: &DynamicMessage,
) -> Result<(), CallError> {
    let text = presenter.format(response)?;
    writeln!(out, "{text}")?;
    Ok(())
}
