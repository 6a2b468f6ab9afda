/// Events emitted while a [`Batch`](super::batch::Batch) is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    BatchStart { geometries: u64 },
    /// One geometry evaluated; geometries finish in any order when run in parallel.
    GeometryFinished { energy: f64 },
    BatchFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards [`Progress`] events to an optional front-end callback.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    /// A reporter that drops every event.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.callback.is_none()
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
