//! The UI thread's message loop and its execution context.
//!
//! A [`MessageLoop`] is bound to the thread that created it and runs posted
//! callbacks one at a time, in order. Nothing posted here ever interleaves with
//! another callback. The [`ExecutionContext`] half can be shared with any
//! thread; it answers "am I on the UI thread?" and posts work to the loop.

use std::{
    fmt,
    sync::Arc,
    thread::{self, ThreadId},
};

use tokio::sync::{mpsc, oneshot};

use crate::ThreadingError;

type Callback = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Invoke(Callback),
    Quit,
}

pub struct ExecutionContext {
    main_thread: ThreadId,
    sender: mpsc::UnboundedSender<Message>,
}

impl ExecutionContext {
    /// The main-thread predicate.
    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_thread
    }

    #[must_use]
    pub fn main_thread(&self) -> ThreadId {
        self.main_thread
    }

    /// Queue `callback` to run on the UI thread after everything already queued.
    pub fn post<F>(&self, callback: F) -> Result<(), ThreadingError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(Message::Invoke(Box::new(callback)))
            .map_err(|_| ThreadingError::MessageLoopClosed)
    }

    /// Run `callback` on the UI thread and wait for its return value.
    ///
    /// Must not be awaited from the UI thread itself: the loop cannot pick up
    /// the callback while it is blocked on the caller.
    pub async fn invoke<F, R>(&self, callback: F) -> Result<R, ThreadingError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.post(move || {
            let _ = tx.send(callback());
        })?;
        rx.await.map_err(|_| ThreadingError::MessageLoopClosed)
    }

    /// Ask the loop to stop after the callbacks already queued ahead of this.
    pub fn quit(&self) {
        let _ = self.sender.send(Message::Quit);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("main_thread", &self.main_thread)
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub struct MessageLoop {
    main_thread: ThreadId,
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl MessageLoop {
    /// Bind a new loop to the calling thread.
    #[must_use]
    pub fn for_current_thread() -> (Self, Arc<ExecutionContext>) {
        let main_thread = thread::current().id();
        let (sender, receiver) = mpsc::unbounded_channel();
        let message_loop = Self {
            main_thread,
            receiver,
        };
        let context = Arc::new(ExecutionContext {
            main_thread,
            sender,
        });
        (message_loop, context)
    }

    /// Dispatch callbacks until [`ExecutionContext::quit`] is posted or every
    /// context handle is dropped. Returns how many callbacks ran.
    ///
    /// Blocks the calling thread, which must be the one that created the loop,
    /// and must not be inside a tokio runtime context.
    pub fn run(mut self) -> usize {
        debug_assert_eq!(
            thread::current().id(),
            self.main_thread,
            "message loop must run on the thread that created it"
        );

        let mut dispatched = 0usize;
        while let Some(message) = self.receiver.blocking_recv() {
            match message {
                Message::Invoke(callback) => {
                    callback();
                    dispatched += 1;
                }
                Message::Quit => break,
            }
        }

        // Anything still queued is dropped; `invoke` callers see MessageLoopClosed.
        self.receiver.close();
        tracing::debug!(dispatched, "Message loop exited");
        dispatched
    }
}
