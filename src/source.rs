//! Frame source capability

use crate::{Frame, Result};

/// A source of frames for the producer loop.
///
/// Sources abstract over where pixels come from (live capture or a
/// synthetic generator). The producer loop owns the source, assigns frame
/// ids and handles pacing; a source only acquires the next sample.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Acquire the next frame and stamp it with `id`.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - New frame available
    /// - `Ok(None)` - Source exhausted (normal termination)
    /// - `Err(e)` - This acquisition failed; the next call may succeed
    async fn next_frame(&mut self, id: u64) -> Result<Option<Frame>>;

    /// Short description for logs
    fn describe(&self) -> String;
}

#[async_trait::async_trait]
impl FrameSource for Box<dyn FrameSource> {
    async fn next_frame(&mut self, id: u64) -> Result<Option<Frame>> {
        (**self).next_frame(id).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
