//! Fixed-interval windowing for streams

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Items that completed inside one window
#[derive(Debug)]
pub struct Window<T> {
    /// Wall-clock time the window opened
    pub start: SystemTime,
    /// Items in arrival order
    pub items: Vec<T>,
}

/// Extension trait to group any Stream into fixed time windows
pub trait WindowExt: Stream {
    /// Group items into consecutive windows of `period`.
    ///
    /// Windows close on the clock, not on item count, so a window with no
    /// items is still emitted. When the stream ends, items collected since
    /// the last boundary are emitted as a final window.
    fn windows(self, period: Duration) -> Windowed<Self>
    where
        Self: Sized,
    {
        Windowed::new(self, period)
    }
}

impl<T: Stream> WindowExt for T {}

pin_project! {
    /// A stream combinator that emits one `Window` per interval
    pub struct Windowed<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        buffer: Vec<S::Item>,
        window_start: SystemTime,
        finished: bool,
    }
}

impl<S: Stream> Windowed<S> {
    /// Create a new windowed stream. The first window opens now.
    pub fn new(stream: S, period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        // Late boundaries shift later windows instead of bursting empties
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { stream, interval, buffer: Vec::new(), window_start: SystemTime::now(), finished: false }
    }
}

impl<S: Stream> Stream for Windowed<S> {
    type Item = Window<S::Item>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.finished {
            return Poll::Ready(None);
        }

        // Drain everything available so membership follows completion time
        loop {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => this.buffer.push(item),
                Poll::Ready(None) => {
                    *this.finished = true;
                    if this.buffer.is_empty() {
                        return Poll::Ready(None);
                    }
                    let items = std::mem::take(this.buffer);
                    return Poll::Ready(Some(Window { start: *this.window_start, items }));
                }
                Poll::Pending => break,
            }
        }

        match this.interval.poll_tick(cx) {
            Poll::Ready(_) => {
                let start = std::mem::replace(this.window_start, SystemTime::now());
                let items = std::mem::take(this.buffer);
                Poll::Ready(Some(Window { start, items }))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
