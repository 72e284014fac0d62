// ============================================================================
// BACKGROUND IMAGE LOADER: decode on a worker thread, apply on the owner
// ============================================================================
//
// Each request bumps a generation counter.  Results come back over an mpsc
// channel tagged with the generation they were started for; anything older
// than the latest request is dropped, so the last request always wins.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;

/// Decodes a background image from its source string.
pub trait ImageLoader: Send + Sync + 'static {
    fn load(&self, source: &str) -> Result<RgbaImage, String>;
}

/// Loads reference images from the filesystem with `image::open`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileImageLoader;

impl ImageLoader for FileImageLoader {
    fn load(&self, source: &str) -> Result<RgbaImage, String> {
        image::open(source)
            .map(|img| img.to_rgba8())
            .map_err(|e| format!("{}: {}", source, e))
    }
}

struct LoadResult {
    generation: u64,
    image: Result<RgbaImage, String>,
}

pub struct BackgroundLoader {
    loader: Arc<dyn ImageLoader>,
    sender: mpsc::Sender<LoadResult>,
    receiver: mpsc::Receiver<LoadResult>,
    generation: u64,
    source: Option<String>,
    pending: bool,
    image: Option<RgbaImage>,
}

impl BackgroundLoader {
    pub fn new(loader: Arc<dyn ImageLoader>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            loader,
            sender,
            receiver,
            generation: 0,
            source: None,
            pending: false,
            image: None,
        }
    }

    /// Switch to a new source.  The current image is dropped immediately;
    /// `None` just clears it.  Requesting the current source again is a no-op.
    pub fn request(&mut self, source: Option<&str>) {
        if self.source.as_deref() == source {
            return;
        }
        self.generation += 1;
        self.source = source.map(str::to_string);
        self.image = None;
        self.pending = false;

        let Some(source) = source else {
            return;
        };
        self.pending = true;

        let generation = self.generation;
        let loader = Arc::clone(&self.loader);
        let sender = self.sender.clone();
        let source = source.to_string();
        std::thread::spawn(move || {
            let image = loader.load(&source);
            let _ = sender.send(LoadResult { generation, image });
        });
    }

    /// Apply finished loads.  Returns `true` when the current request
    /// completed (successfully or not), i.e. the background changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(result) = self.receiver.try_recv() {
            changed |= self.apply(result);
        }
        changed
    }

    /// Block until the current request completes or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.receiver.recv_timeout(remaining) {
                Ok(result) => {
                    if self.apply(result) {
                        return true;
                    }
                }
                Err(_) => return false,
            }
        }
        false
    }

    fn apply(&mut self, result: LoadResult) -> bool {
        if result.generation != self.generation {
            return false;
        }
        self.pending = false;
        match result.image {
            Ok(image) => {
                crate::log_info!(
                    "Background image loaded ({}x{})",
                    image.width(),
                    image.height()
                );
                self.image = Some(image);
            }
            Err(e) => {
                crate::log_err!("Failed to load background image: {}", e);
                self.image = None;
            }
        }
        true
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serves solid images whose width encodes the request; sources listed in
    /// `slow` sleep before answering.
    struct FakeLoader {
        slow: Mutex<Vec<String>>,
    }

    impl ImageLoader for FakeLoader {
        fn load(&self, source: &str) -> Result<RgbaImage, String> {
            let is_slow = self.slow.lock().map(|s| s.iter().any(|x| x == source)).unwrap_or(false);
            if is_slow {
                std::thread::sleep(Duration::from_millis(150));
            }
            match source {
                "missing" => Err("not found".into()),
                other => Ok(RgbaImage::new(other.len() as u32, 1)),
            }
        }
    }

    fn loader(slow: &[&str]) -> BackgroundLoader {
        BackgroundLoader::new(Arc::new(FakeLoader {
            slow: Mutex::new(slow.iter().map(|s| s.to_string()).collect()),
        }))
    }

    #[test]
    fn loads_complete_through_wait() {
        let mut bg = loader(&[]);
        bg.request(Some("abc"));
        assert!(bg.is_loading());
        assert!(bg.wait(Duration::from_secs(5)));
        assert_eq!(bg.image().map(|i| i.width()), Some(3));
    }

    #[test]
    fn superseded_loads_are_discarded() {
        let mut bg = loader(&["slow-first"]);
        bg.request(Some("slow-first"));
        bg.request(Some("ab"));
        assert!(bg.wait(Duration::from_secs(5)));
        assert_eq!(bg.image().map(|i| i.width()), Some(2));

        std::thread::sleep(Duration::from_millis(300));
        assert!(!bg.poll());
        assert_eq!(bg.image().map(|i| i.width()), Some(2));
    }

    #[test]
    fn failures_leave_the_background_blank() {
        let mut bg = loader(&[]);
        bg.request(Some("missing"));
        assert!(bg.wait(Duration::from_secs(5)));
        assert!(bg.image().is_none());
        assert!(!bg.is_loading());
    }

    #[test]
    fn clearing_is_immediate() {
        let mut bg = loader(&[]);
        bg.request(Some("abc"));
        bg.wait(Duration::from_secs(5));
        bg.request(None);
        assert!(bg.image().is_none());
        assert!(!bg.wait(Duration::from_millis(10)));
    }
}
