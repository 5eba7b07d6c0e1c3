//! Process-wide recycling of transaction buffers.
//!
//! Transactions churn at wire rate, and their op tables and data stores
//! are the only allocations that matter. Sharing is `Arc<TxMsg>`, so the
//! atomic strong count is the reference count; when the last holder drops
//! the message, `TxMsg::drop` hands both buffers back here for the next
//! [`acquire_buffers`] call. The pool is bounded; beyond that, buffers
//! fall to the allocator.

use std::sync::Mutex;

use crate::msg::TxOp;

const POOL_MAX: usize = 64;

pub(crate) struct TxBuffers {
    pub ops: Vec<TxOp>,
    pub data: Vec<u8>,
}

static POOL: Mutex<Vec<TxBuffers>> = Mutex::new(Vec::new());

pub(crate) fn acquire_buffers() -> TxBuffers {
    let mut pool = POOL.lock().unwrap_or_else(|e| e.into_inner());
    pool.pop().unwrap_or(TxBuffers {
        ops: Vec::new(),
        data: Vec::new(),
    })
}

pub(crate) fn recycle(mut ops: Vec<TxOp>, mut data: Vec<u8>) {
    ops.clear();
    data.clear();
    let mut pool = POOL.lock().unwrap_or_else(|e| e.into_inner());
    if pool.len() < POOL_MAX {
        pool.push(TxBuffers { ops, data });
    }
}

