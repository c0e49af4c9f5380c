//! Virtual card image storage
//!
//! Persists a virtual SLE4442 image as JSON, one file per card name.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::state::Sle4442Image;

/// Handles persistent storage of a virtual card image
pub struct CardImageStore {
    storage_dir: PathBuf,
    image_file: PathBuf,
    pub image: Sle4442Image,
}

impl CardImageStore {
    const IMAGE_EXTENSION: &'static str = "json";

    /// Store for card `name` inside `storage_dir`
    pub fn new(storage_dir: &Path, name: &str) -> Self {
        let file_name = format!("{}.{}", Self::file_stem(name), Self::IMAGE_EXTENSION);
        let image_file = storage_dir.join(file_name);

        Self {
            storage_dir: storage_dir.to_path_buf(),
            image_file,
            image: Sle4442Image::default(),
        }
    }

    /// Keep file names to a safe character set
    fn file_stem(name: &str) -> String {
        name.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }

    pub fn image_file(&self) -> &Path {
        &self.image_file
    }

    /// Ensure the storage directory exists
    fn ensure_storage_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.storage_dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.storage_dir, fs::Permissions::from_mode(0o700));
        }
        Ok(())
    }

    /// Load the image from storage
    ///
    /// Returns true if an image was loaded, false if a blank card was created
    pub fn load(&mut self) -> bool {
        if !self.image_file.exists() {
            info!("No existing card image, starting with a blank card");
            self.image = Sle4442Image::default();
            return false;
        }

        let content = match fs::read_to_string(&self.image_file) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read card image file: {}", e);
                self.image = Sle4442Image::default();
                return false;
            }
        };

        match serde_json::from_str::<Sle4442Image>(&content) {
            Ok(image) if image.is_well_formed() => {
                self.image = image;
                info!("Loaded card image from {:?}", self.image_file);
                true
            }
            Ok(_) => {
                warn!("Card image {:?} has the wrong shape, starting blank", self.image_file);
                self.image = Sle4442Image::default();
                false
            }
            Err(e) => {
                warn!("Failed to parse card image: {}", e);
                self.image = Sle4442Image::default();
                false
            }
        }
    }

    /// Save the image to storage
    pub fn save(&self) -> bool {
        if let Err(e) = self.ensure_storage_dir() {
            warn!("Failed to create storage directory: {}", e);
            return false;
        }

        let json = match serde_json::to_string_pretty(&self.image) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize card image: {}", e);
                return false;
            }
        };

        match fs::write(&self.image_file, json) {
            Ok(()) => {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let mode = fs::Permissions::from_mode(0o600);
                    let _ = fs::set_permissions(&self.image_file, mode);
                }
                debug!("Saved card image to {:?}", self.image_file);
                true
            }
            Err(e) => {
                warn!("Failed to write card image: {}", e);
                false
            }
        }
    }

    /// Replace the image with a blank card and save it
    pub fn reset_to_factory(&mut self) -> bool {
        self.image = Sle4442Image::default();
        info!("Card image reset to factory defaults");
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_store() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = CardImageStore::new(temp_dir.path(), "card0");

        assert!(!store.load());
        assert_eq!(store.image, Sle4442Image::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = CardImageStore::new(temp_dir.path(), "card0");
        store.load();

        store.image.memory[0x40] = 0x42;
        store.image.error_counter = 0x03;
        assert!(store.save());

        let mut store2 = CardImageStore::new(temp_dir.path(), "card0");
        assert!(store2.load());
        assert_eq!(store2.image.memory[0x40], 0x42);
        assert_eq!(store2.image.error_counter, 0x03);
    }

    #[test]
    fn test_file_name_sanitized() {
        let temp_dir = TempDir::new().unwrap();
        let store = CardImageStore::new(temp_dir.path(), "ACS ACR38U 00/00");
        assert_eq!(
            store.image_file().file_name().unwrap(),
            "ACS_ACR38U_00_00.json"
        );
    }

    #[test]
    fn test_corrupt_file_starts_blank() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = CardImageStore::new(temp_dir.path(), "card0");
        fs::write(store.image_file(), "{ not json").unwrap();
        assert!(!store.load());

        let short = r#"{"memory":"AAAA","protection":"","psc":"","error_counter":7}"#;
        fs::write(store.image_file(), short).unwrap();
        assert!(!store.load());
        assert_eq!(store.image, Sle4442Image::default());
    }

    #[test]
    fn test_reset_to_factory() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = CardImageStore::new(temp_dir.path(), "card0");
        store.image.memory[0] = 0x00;
        store.save();

        assert!(store.reset_to_factory());
        let mut reloaded = CardImageStore::new(temp_dir.path(), "card0");
        assert!(reloaded.load());
        assert_eq!(reloaded.image.memory[0], 0xFF);
    }
}
