pub mod traits;

use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

pub use traits::{EventEmitter, ImageGenerator, StepsSetting, UserDirectory, UserRecord};

/// Serialises every holder of the host-wide step override.
static OVERRIDE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Temporarily replaces the host's default step count.
///
/// The previous value is written back when the guard drops, on every exit
/// path. Only one override can be alive per process at a time.
pub struct StepsOverride {
    setting: Arc<dyn StepsSetting>,
    original: u32,
    _lock: MutexGuard<'static, ()>,
}

impl StepsOverride {
    /// Returns `None` (after logging) when the setting cannot be read or written.
    pub async fn acquire(setting: Arc<dyn StepsSetting>, steps: u32) -> Option<Self> {
        let lock = OVERRIDE_LOCK.lock().await;

        let original = match setting.image_steps() {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Could not read host step setting: {}", e);
                return None;
            }
        };

        if let Err(e) = setting.set_image_steps(steps) {
            log::warn!("Could not override host step setting: {}", e);
            return None;
        }
        log::info!("Overriding host steps: {} -> {}", original, steps);

        Some(Self {
            setting,
            original,
            _lock: lock,
        })
    }

    pub fn original(&self) -> u32 {
        self.original
    }
}

impl Drop for StepsOverride {
    fn drop(&mut self) {
        match self.setting.set_image_steps(self.original) {
            Ok(()) => log::info!("Host step setting restored: {}", self.original),
            Err(e) => log::error!("Error restoring host step setting: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ToolError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct MemorySteps(AtomicU32);

    impl StepsSetting for MemorySteps {
        fn image_steps(&self) -> Result<u32> {
            Ok(self.0.load(Ordering::SeqCst))
        }

        fn set_image_steps(&self, steps: u32) -> Result<()> {
            self.0.store(steps, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Unreadable;

    impl StepsSetting for Unreadable {
        fn image_steps(&self) -> Result<u32> {
            Err(ToolError::Settings("no app state".into()))
        }

        fn set_image_steps(&self, _steps: u32) -> Result<()> {
            panic!("must not be written when unreadable");
        }
    }

    #[tokio::test]
    async fn test_override_restores_on_drop() {
        let setting = Arc::new(MemorySteps(AtomicU32::new(30)));
        {
            let guard = StepsOverride::acquire(setting.clone(), 12).await.unwrap();
            assert_eq!(guard.original(), 30);
            assert_eq!(setting.image_steps().unwrap(), 12);
        }
        assert_eq!(setting.image_steps().unwrap(), 30);
    }

    #[tokio::test]
    async fn test_unreadable_setting_skips_override() {
        assert!(StepsOverride::acquire(Arc::new(Unreadable), 5).await.is_none());
    }

    #[tokio::test]
    async fn test_second_override_waits_for_first() {
        let setting = Arc::new(MemorySteps(AtomicU32::new(20)));
        let first = StepsOverride::acquire(setting.clone(), 8).await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            StepsOverride::acquire(setting.clone(), 9),
        )
        .await;
        assert!(blocked.is_err());

        drop(first);
        let second = StepsOverride::acquire(setting.clone(), 9).await.unwrap();
        assert_eq!(second.original(), 20);
        drop(second);
        assert_eq!(setting.image_steps().unwrap(), 20);
    }
}
