//! Message types for actor communication.

use ractor::RpcReplyPort;

/// Messages for the [`WorkerActor`](crate::WorkerActor).
#[derive(Debug)]
pub enum WorkerMessage {
    /// Try to claim and run the next job.
    Poll,

    /// Report the number of jobs recorded so far.
    Processed { reply: RpcReplyPort<u64> },

    /// Stop after the job in hand, if any, is recorded.
    Shutdown,
}
