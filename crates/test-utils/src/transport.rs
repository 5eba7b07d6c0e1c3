//! A duplex in-memory transport carrying serialized transactions.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use plexus_api::Transport;
use plexus_tx::TxMsg;
use plexus_types::error::stock;
use plexus_types::{ErrorKind, Result};

/// One end of an in-memory duplex transport pair.
///
/// Every transaction crosses as its full serialized byte form, so the
/// preamble, delta op table, and data store are exercised exactly as they
/// would be over a socket. Closing either end surfaces as
/// [`ErrorKind::NotConnected`] on both.
pub struct MemoryTransport {
    label: String,
    out: mpsc::Sender<Vec<u8>>,
    inbound: Mutex<mpsc::Receiver<Vec<u8>>>,
}

impl MemoryTransport {
    /// A connected pair of transport ends.
    pub fn pair() -> (Arc<MemoryTransport>, Arc<MemoryTransport>) {
        let (a_out, b_in) = mpsc::channel(32);
        let (b_out, a_in) = mpsc::channel(32);
        (
            Arc::new(MemoryTransport {
                label: "mem:a".to_string(),
                out: a_out,
                inbound: Mutex::new(a_in),
            }),
            Arc::new(MemoryTransport {
                label: "mem:b".to_string(),
                out: b_out,
                inbound: Mutex::new(b_in),
            }),
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn send_tx(&self, tx: Arc<TxMsg>) -> Result<()> {
        // the shared tx stays immutable; serialization works on a scratch copy
        let mut scratch = TxMsg::acquire();
        scratch.envelope = tx.envelope.clone();
        scratch.header = tx.header.clone();
        scratch.ops.extend_from_slice(&tx.ops);
        scratch.data_store.extend_from_slice(&tx.data_store);

        let mut bytes = Vec::with_capacity(scratch.ceiling_size());
        scratch.marshal_to_buffer(&mut bytes);

        self.out
            .send(bytes)
            .await
            .map_err(|_| stock::stream_closed())
    }

    async fn recv_tx(&self) -> Result<TxMsg> {
        let bytes = {
            let mut inbound = self.inbound.lock().await;
            inbound.recv().await.ok_or_else(stock::stream_closed)?
        };
        TxMsg::read_from(&mut bytes.as_slice()).map_err(|err| {
            if err.kind == ErrorKind::NotConnected {
                stock::stream_closed()
            } else {
                err
            }
        })
    }

    async fn close(&self) {
        let mut inbound = self.inbound.lock().await;
        inbound.close();
    }
}
