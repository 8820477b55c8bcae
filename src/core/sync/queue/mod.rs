/*!
 * Wait Queue Primitives
 *
 * CLH-style FIFO of blocked threads shared by every queued synchronizer.
 */

mod node;
mod queue;

pub use node::{Mode, NodeStatus, WaitNode};
pub use queue::WaitQueue;
