//! JSON-RPC client plumbing shared by the external and injected adapters.
//!
//! Outgoing requests are matched to responses by id through a pending map; inbound
//! notifications are forwarded to the manager through a weak handler reference so the
//! manager/adapter ownership cycle is broken on shutdown. Cancellation uses a take-once slot
//! for the request id: the cancellation path and the completion path both try to take it, and
//! only the winner sends (or suppresses) the `$/cancelRequest` notification, so it is sent
//! exactly once per cancelled request and never for a completed one.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use anyhow::Result;
use bsp_server::{ErrorCode, Message, RequestId, Response};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::warn;
use rustc_hash::FxHashMap;

use bsp_types::notifications::{self, CancelRequestParams, Notification, RequestIdParam};
use bsp_types::requests::Request;

use crate::adapters::InboundMessageHandler;
use crate::error::AdapterError;
use crate::utils::TakeOnce;

/// Byte sink for outgoing messages; stdio framing for subprocesses, a channel for tests.
pub trait Transport: Send {
    fn send(&mut self, message: Message) -> Result<()>;
}

pub struct WriteTransport<W: std::io::Write + Send>(pub W);

impl<W: std::io::Write + Send> Transport for WriteTransport<W> {
    fn send(&mut self, message: Message) -> Result<()> {
        message.write(&mut self.0)?;
        Ok(())
    }
}

pub struct ChannelTransport(pub Sender<Message>);

impl Transport for ChannelTransport {
    fn send(&mut self, message: Message) -> Result<()> {
        self.0
            .send(message)
            .map_err(|_| AdapterError::ServerCrashed.into())
    }
}

pub(crate) struct RpcClient {
    inner: Arc<RpcClientInner>,
}

struct RpcClientInner {
    transport: Mutex<Box<dyn Transport>>,
    pending: Mutex<FxHashMap<RequestId, Sender<Response>>>,
    next_id: AtomicI32,
    handler: Weak<dyn InboundMessageHandler>,
}

impl RpcClient {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        handler: Weak<dyn InboundMessageHandler>,
    ) -> RpcClient {
        RpcClient {
            inner: Arc::new(RpcClientInner {
                transport: Mutex::new(transport),
                pending: Mutex::new(FxHashMap::default()),
                next_id: AtomicI32::new(1),
                handler,
            }),
        }
    }

    /// A second handle onto the same client, for the reader thread.
    pub(crate) fn clone_for_reader(&self) -> RpcClient {
        RpcClient {
            inner: Arc::clone(&self.inner),
        }
    }

    pub(crate) fn send_request<R: Request>(
        &self,
        params: R::Params,
    ) -> Result<PendingResponse<R>> {
        let id = RequestId::from(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(1);
        self.inner
            .pending
            .lock()
            .unwrap()
            .insert(id.clone(), sender);

        let request = bsp_server::Request::new(id.clone(), R::METHOD.to_string(), params);
        let sent = self
            .inner
            .transport
            .lock()
            .unwrap()
            .send(Message::Request(request));
        if let Err(err) = sent {
            self.inner.pending.lock().unwrap().remove(&id);
            return Err(err);
        }

        Ok(PendingResponse {
            receiver,
            id_slot: Arc::new(TakeOnce::new(id)),
            client: Arc::downgrade(&self.inner),
            _response: PhantomData,
        })
    }

    pub(crate) fn send_notification<N: Notification>(&self, params: N::Params) -> Result<()> {
        let notification = bsp_server::Notification::new(N::METHOD.to_string(), params);
        self.inner
            .transport
            .lock()
            .unwrap()
            .send(Message::Notification(notification))
    }

    /// Route one message arriving from the server.
    pub(crate) fn handle_message(&self, message: Message) {
        self.inner.handle_message(message);
    }

    /// Drop every pending request; their awaiters observe a crash error.
    pub(crate) fn fail_pending(&self) {
        self.inner.pending.lock().unwrap().clear();
    }
}

impl RpcClientInner {
    fn handle_message(&self, message: Message) {
        match message {
            Message::Response(response) => {
                let sender = self.pending.lock().unwrap().remove(&response.id);
                match sender {
                    Some(sender) => {
                        let _ = sender.send(response);
                    }
                    None => warn!("response to unknown request: {:?}", response.id),
                }
            }
            Message::Notification(notification) => match self.handler.upgrade() {
                Some(handler) => handler.handle_notification(notification),
                None => warn!(
                    "dropping notification after manager shutdown: {}",
                    notification.method
                ),
            },
            Message::Request(request) => {
                // Build servers have no business sending requests to this client.
                let response = Response::new_err(
                    request.id,
                    ErrorCode::MethodNotFound as i32,
                    format!("unknown request: {}", request.method),
                );
                let _ = self
                    .transport
                    .lock()
                    .unwrap()
                    .send(Message::Response(response));
            }
        }
    }

    fn send_cancel(&self, id: RequestId) {
        let id = match id.to_string().parse::<i32>() {
            Ok(number) => RequestIdParam::Number(number),
            Err(_) => RequestIdParam::String(id.to_string()),
        };
        let notification = bsp_server::Notification::new(
            notifications::CancelRequest::METHOD.to_string(),
            CancelRequestParams { id },
        );
        let _ = self
            .transport
            .lock()
            .unwrap()
            .send(Message::Notification(notification));
    }
}

/// A response that has not arrived yet.
pub struct PendingResponse<R: Request> {
    receiver: Receiver<Response>,
    id_slot: Arc<TakeOnce<RequestId>>,
    client: Weak<RpcClientInner>,
    _response: PhantomData<fn() -> R>,
}

impl<R: Request> PendingResponse<R> {
    pub fn wait(self) -> Result<R::Result> {
        let response = self
            .receiver
            .recv()
            .map_err(|_| AdapterError::ServerCrashed)?;
        // Completed: a later cancel must not fire.
        self.id_slot.take();
        response_to_result::<R>(response)
    }

    /// `Ok(None)` on timeout; the request stays in flight.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Option<R::Result>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(response) => {
                self.id_slot.take();
                response_to_result::<R>(response).map(Some)
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Ok(None),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                Err(AdapterError::ServerCrashed.into())
            }
        }
    }

    /// Ask the server to abandon the request. Exactly one `$/cancelRequest` is sent even when
    /// cancellation races with completion or with a concurrent cancel.
    pub fn cancel(&self) {
        if let Some(id) = self.id_slot.take() {
            if let Some(client) = self.client.upgrade() {
                client.send_cancel(id);
            }
        }
    }
}

fn response_to_result<R: Request>(response: Response) -> Result<R::Result> {
    if let Some(error) = response.error {
        if error.code == ErrorCode::MethodNotFound as i32 {
            return Err(AdapterError::MethodNotFound(R::METHOD.to_string()).into());
        }
        return Err(AdapterError::Protocol(error.message).into());
    }
    let value = response.result.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value)
        .map_err(|err| AdapterError::Protocol(format!("malformed {} response: {err}", R::METHOD)).into())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use crossbeam_channel::unbounded;

    use bsp_types::requests::BuildShutdown;

    use super::*;

    struct NullHandler;
    impl InboundMessageHandler for NullHandler {
        fn handle_notification(&self, _notification: bsp_server::Notification) {}
    }

    fn client_pair() -> (RpcClient, Receiver<Message>, Arc<NullHandler>) {
        let (sender, receiver) = unbounded();
        let handler = Arc::new(NullHandler);
        let weak = Arc::downgrade(&handler) as Weak<dyn InboundMessageHandler>;
        let client = RpcClient::new(Box::new(ChannelTransport(sender)), weak);
        (client, receiver, handler)
    }

    #[test]
    fn response_routing() {
        let (client, outgoing, _handler) = client_pair();
        let pending = client.send_request::<BuildShutdown>(()).unwrap();

        let request = match outgoing.recv().unwrap() {
            Message::Request(request) => request,
            other => panic!("expected request, got {other:?}"),
        };
        assert_eq!(request.method, "build/shutdown");

        client.handle_message(Message::Response(Response::new_ok(request.id, ())));
        pending.wait().unwrap();
    }

    #[test]
    fn failed_pending_requests_surface_crash() {
        let (client, _outgoing, _handler) = client_pair();
        let pending = client.send_request::<BuildShutdown>(()).unwrap();
        client.fail_pending();

        let err = pending.wait().unwrap_err();
        assert!(err.downcast_ref::<AdapterError>().is_some());
    }

    #[test]
    #[ntest::timeout(10000)]
    fn cancel_is_sent_exactly_once_under_racing_cancels() {
        let (client, outgoing, _handler) = client_pair();
        let pending = Arc::new(client.send_request::<BuildShutdown>(()).unwrap());
        let _request = outgoing.recv().unwrap();

        let cancels = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pending = Arc::clone(&pending);
                std::thread::spawn(move || pending.cancel())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        while let Ok(message) = outgoing.try_recv() {
            if let Message::Notification(notification) = message {
                if notification.method == "$/cancelRequest" {
                    cancels.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn completed_request_is_never_cancelled() {
        let (client, outgoing, _handler) = client_pair();
        let pending = client.send_request::<BuildShutdown>(()).unwrap();
        let request = match outgoing.recv().unwrap() {
            Message::Request(request) => request,
            other => panic!("expected request, got {other:?}"),
        };

        client.handle_message(Message::Response(Response::new_ok(request.id, ())));
        // Receiving the response takes the id, so this cancel must be a no-op.
        let result = pending.wait_timeout(Duration::from_secs(1)).unwrap();
        assert!(result.is_some());
        pending.cancel();

        assert!(outgoing.try_recv().is_err());
    }
}
