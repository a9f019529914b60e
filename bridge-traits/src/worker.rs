//! Typed worker channels.
//!
//! Each worker (transport, decoder) talks to the player over a pair of
//! one-way channels carrying a closed set of message variants. The player
//! holds a [`WorkerChannel`] (send requests, receive responses); the worker
//! holds the matching [`WorkerEndpoint`] (receive requests, send responses).
//!
//! ```text
//!   player                                 worker task
//! ┌───────────────┐   Req (mpsc)    ┌────────────────┐
//! │ WorkerChannel ├────────────────>│ WorkerEndpoint │
//! │               │<────────────────┤                │
//! └───────────────┘   Resp (mpsc)   └────────────────┘
//! ```
//!
//! No request ever waits for its response. Late responses are the
//! receiver's problem, which is why the transport tags chunk traffic with a
//! sequence number.

use core_async::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::error::{BridgeError, Result};

/// Creates a connected channel pair.
pub fn worker_channel<Req, Resp>() -> (WorkerChannel<Req, Resp>, WorkerEndpoint<Req, Resp>) {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (response_tx, response_rx) = mpsc::unbounded_channel();

    (
        WorkerChannel {
            requests: request_tx,
            responses: response_rx,
        },
        WorkerEndpoint {
            requests: request_rx,
            responses: response_tx,
        },
    )
}

/// Player side of a worker connection.
#[derive(Debug)]
pub struct WorkerChannel<Req, Resp> {
    requests: UnboundedSender<Req>,
    responses: UnboundedReceiver<Resp>,
}

impl<Req, Resp> WorkerChannel<Req, Resp> {
    /// Posts a request. Fails only when the worker has gone away.
    pub fn send(&self, request: Req) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| BridgeError::ChannelClosed("worker stopped receiving requests".into()))
    }

    /// Waits for the next response; `None` once the worker has exited.
    pub async fn recv(&mut self) -> Option<Resp> {
        self.responses.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Resp> {
        match self.responses.try_recv() {
            Ok(response) => Some(response),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    /// Splits into the raw halves, for callers that select over them.
    pub fn into_parts(self) -> (UnboundedSender<Req>, UnboundedReceiver<Resp>) {
        (self.requests, self.responses)
    }
}

/// Worker side of a connection.
#[derive(Debug)]
pub struct WorkerEndpoint<Req, Resp> {
    requests: UnboundedReceiver<Req>,
    responses: UnboundedSender<Resp>,
}

impl<Req, Resp> WorkerEndpoint<Req, Resp> {
    /// Waits for the next request; `None` once the player dropped its side.
    pub async fn next_request(&mut self) -> Option<Req> {
        self.requests.recv().await
    }

    pub fn try_next_request(&mut self) -> Option<Req> {
        self.requests.try_recv().ok()
    }

    /// Posts a response back to the player.
    pub fn respond(&self, response: Resp) -> Result<()> {
        self.responses
            .send(response)
            .map_err(|_| BridgeError::ChannelClosed("player stopped receiving responses".into()))
    }

    /// A cloneable response handle for work completed on other tasks.
    pub fn responder(&self) -> UnboundedSender<Resp> {
        self.responses.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_through_pair() {
        let (mut channel, mut endpoint) = worker_channel::<u32, String>();

        channel.send(5).unwrap();
        assert_eq!(endpoint.next_request().await, Some(5));

        endpoint.respond("five".to_string()).unwrap();
        assert_eq!(channel.recv().await.as_deref(), Some("five"));
        assert!(channel.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_send_fails_after_worker_exit() {
        let (channel, endpoint) = worker_channel::<u32, ()>();
        drop(endpoint);

        assert!(channel.is_closed());
        assert!(matches!(channel.send(1), Err(BridgeError::ChannelClosed(_))));
    }

    #[tokio::test]
    async fn test_responder_outlives_endpoint_borrow() {
        let (mut channel, endpoint) = worker_channel::<(), u8>();
        let responder = endpoint.responder();

        tokio::spawn(async move {
            responder.send(9).unwrap();
        })
        .await
        .unwrap();

        assert_eq!(channel.recv().await, Some(9));
    }
}
