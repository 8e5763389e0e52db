//! Types that cross the thread boundary between the recognition engine and
//! the host's tick thread.
//!
//! Everything here is plain data: no references to engine or host state, so
//! values move across threads with no synchronisation beyond the queue's own.

pub mod events;
