//! A build-server backend injected as a channel pair, for tests and in-process embedding.

use std::sync::Weak;

use anyhow::Result;
use bsp_server::Message;
use crossbeam_channel::{unbounded, Receiver, Sender};

use bsp_types::notifications::Notification;
use bsp_types::requests::Request;

use crate::adapters::rpc::{ChannelTransport, PendingResponse, RpcClient};
use crate::adapters::InboundMessageHandler;

/// One end of an in-memory BSP connection.
pub struct InjectedConnection {
    pub sender: Sender<Message>,
    pub receiver: Receiver<Message>,
}

impl InjectedConnection {
    /// A connected pair: the first end goes to the manager, the second acts as the server.
    pub fn memory() -> (InjectedConnection, InjectedConnection) {
        let (client_sender, server_receiver) = unbounded();
        let (server_sender, client_receiver) = unbounded();
        (
            InjectedConnection {
                sender: client_sender,
                receiver: client_receiver,
            },
            InjectedConnection {
                sender: server_sender,
                receiver: server_receiver,
            },
        )
    }
}

pub struct InjectedBuildServerAdapter {
    client: RpcClient,
}

impl InjectedBuildServerAdapter {
    pub fn new(
        connection: InjectedConnection,
        handler: Weak<dyn InboundMessageHandler>,
    ) -> InjectedBuildServerAdapter {
        let client = RpcClient::new(Box::new(ChannelTransport(connection.sender)), handler);
        let reader_client = client.clone_for_reader();
        let receiver = connection.receiver;
        // The reader ends when the injected server drops its end of the connection.
        std::thread::spawn(move || {
            for message in receiver {
                reader_client.handle_message(message);
            }
            reader_client.fail_pending();
        });
        InjectedBuildServerAdapter { client }
    }

    pub fn send_request<R: Request>(&self, params: R::Params) -> Result<PendingResponse<R>> {
        self.client.send_request::<R>(params)
    }

    pub fn notify<N: Notification>(&self, params: N::Params) -> Result<()> {
        self.client.send_notification::<N>(params)
    }
}
