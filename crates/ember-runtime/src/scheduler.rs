//! Frame scheduler
//!
//! Stands in for `requestAnimationFrame`: callbacks queued with
//! [`FrameScheduler::request_frame`] run together on the next
//! [`FrameScheduler::run_frame`]. A callback queued while a frame is running
//! waits for the following frame, so work triggered during a flush is never
//! appended to the batch being iterated.
//!
//! A host plugs its frame source in with [`FrameScheduler::set_waker`]: the
//! waker fires whenever the queue goes from empty to non-empty, and the host
//! answers with one `run_frame` call (the browser binding does this from
//! `requestAnimationFrame`). Tests call `run_frame` directly.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

type FrameCallback = Box<dyn FnOnce()>;
type Waker = Rc<dyn Fn()>;

/// Handle of a queued frame callback, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

#[derive(Default)]
struct Queue {
	pending: VecDeque<(FrameHandle, FrameCallback)>,
	frames_run: u64,
	next_handle: u64,
	waker: Option<Waker>,
}

/// Per-page animation-frame queue. Cloning shares the queue.
#[derive(Clone, Default)]
pub struct FrameScheduler {
	queue: Rc<RefCell<Queue>>,
}

impl fmt::Debug for FrameScheduler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let queue = self.queue.borrow();
		f.debug_struct("FrameScheduler")
			.field("pending", &queue.pending.len())
			.field("frames_run", &queue.frames_run)
			.finish()
	}
}

impl FrameScheduler {
	/// Creates an empty scheduler.
	pub fn new() -> Self {
		Self::default()
	}

	/// Installs the function called when work is queued on an idle scheduler.
	pub fn set_waker<F>(&self, waker: F)
	where
		F: Fn() + 'static,
	{
		self.queue.borrow_mut().waker = Some(Rc::new(waker));
	}

	/// Queues `callback` for the next frame.
	pub fn request_frame<F>(&self, callback: F) -> FrameHandle
	where
		F: FnOnce() + 'static,
	{
		let (handle, wake) = {
			let mut queue = self.queue.borrow_mut();
			queue.next_handle += 1;
			let handle = FrameHandle(queue.next_handle);
			let wake = if queue.pending.is_empty() {
				queue.waker.clone()
			} else {
				None
			};
			queue.pending.push_back((handle, Box::new(callback)));
			(handle, wake)
		};
		if let Some(wake) = wake {
			wake();
		}
		handle
	}

	/// Drops a queued callback. Returns false if it already ran or was cancelled.
	pub fn cancel(&self, handle: FrameHandle) -> bool {
		let mut queue = self.queue.borrow_mut();
		let before = queue.pending.len();
		queue.pending.retain(|(h, _)| *h != handle);
		queue.pending.len() != before
	}

	/// Number of callbacks waiting for the next frame.
	pub fn pending(&self) -> usize {
		self.queue.borrow().pending.len()
	}

	/// Returns true if any callback is waiting.
	pub fn has_pending(&self) -> bool {
		self.pending() > 0
	}

	/// Number of frames run so far.
	pub fn frames_run(&self) -> u64 {
		self.queue.borrow().frames_run
	}

	/// Runs every callback queued before this call. Returns how many ran.
	pub fn run_frame(&self) -> usize {
		let batch = {
			let mut queue = self.queue.borrow_mut();
			queue.frames_run += 1;
			std::mem::take(&mut queue.pending)
		};
		let count = batch.len();
		for (_, callback) in batch {
			callback();
		}
		count
	}
}
