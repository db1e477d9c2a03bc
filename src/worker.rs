// ============================================================================
// EDITOR WORKER - runs commands off the caller's thread, one at a time
// ============================================================================

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, mpsc};

use crate::editor::{EditCommand, Editor, ExportedImage, Outcome};
use crate::error::{EditorError, Result};
use crate::{log_err, log_warn};

/// Clears the in-flight flag when the job finishes or unwinds.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Background front end for an [`Editor`].
///
/// Jobs run on the rayon pool and report back through a channel. At most
/// one job is in flight; submitting while busy fails with
/// [`EditorError::Busy`] instead of queueing.
pub struct EditorWorker {
    editor: Arc<Mutex<Editor>>,
    busy: Arc<AtomicBool>,
}

impl EditorWorker {
    pub fn new(editor: Editor) -> Self {
        Self {
            editor: Arc::new(Mutex::new(editor)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run `command` in the background.
    pub fn submit(&self, command: EditCommand) -> Result<mpsc::Receiver<Result<Outcome>>> {
        self.spawn_job(move |editor| editor.handle(command))
    }

    /// Flatten and encode in the background.
    pub fn submit_export(&self) -> Result<mpsc::Receiver<Result<Option<ExportedImage>>>> {
        self.spawn_job(|editor| editor.export())
    }

    /// Read editor state between jobs.
    pub fn with_editor<R>(&self, f: impl FnOnce(&Editor) -> R) -> Result<R> {
        if self.is_busy() {
            return Err(EditorError::Busy);
        }
        let guard = lock(&self.editor);
        Ok(f(&*guard))
    }

    /// Take the editor back once no job holds it.
    pub fn into_inner(self) -> Option<Editor> {
        let mutex = Arc::try_unwrap(self.editor).ok()?;
        Some(mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn spawn_job<T, F>(&self, job: F) -> Result<mpsc::Receiver<Result<T>>>
    where
        T: Send + 'static,
        F: FnOnce(&mut Editor) -> Result<T> + Send + 'static,
    {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log_warn!("worker: rejected submission, a job is already running");
            return Err(EditorError::Busy);
        }

        let in_flight = InFlight(self.busy.clone());
        let editor = self.editor.clone();
        let (sender, receiver) = mpsc::channel();

        rayon::spawn(move || {
            // A panic unwinds out of here and poisons the mutex; the pool
            // thread survives and the caller gets an error instead.
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut guard = lock(&editor);
                job(&mut *guard)
            }))
            .unwrap_or_else(|payload| {
                let msg = panic_message(payload.as_ref());
                log_err!("worker: job panicked: {}", msg);
                Err(EditorError::JobPanicked(msg))
            });
            // Release everything before reporting so the receiver can submit
            // again, or unwrap the editor, straight away.
            drop(editor);
            drop(in_flight);
            let _ = sender.send(result);
        });

        Ok(receiver)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A job that panicked leaves the mutex poisoned. Every command either
/// completes or leaves the editor as it was, so carry on with it.
fn lock(editor: &Mutex<Editor>) -> MutexGuard<'_, Editor> {
    editor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
