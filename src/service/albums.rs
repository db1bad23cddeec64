//! Albums
//!
//! Named collections of photo ids, persisted as one list.

use std::sync::Arc;

use crate::data::{ALBUMS_KEY, Album, EntityId, Store};
use crate::error::AppError;

pub struct AlbumStore {
    store: Arc<Store>,
}

impl AlbumStore {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Create an album from a selection of photo ids
    ///
    /// Duplicate ids in the selection are collapsed, first occurrence wins.
    ///
    /// # Errors
    /// `Validation` when the name is blank
    pub async fn create(&self, name: &str, photo_ids: &[String]) -> Result<Album, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Album name must not be empty".to_string()));
        }

        let mut unique_ids: Vec<String> = Vec::with_capacity(photo_ids.len());
        for id in photo_ids {
            if !unique_ids.contains(id) {
                unique_ids.push(id.clone());
            }
        }

        let album = Album {
            id: EntityId::new().0,
            name: name.to_string(),
            photo_ids: unique_ids,
        };

        self.store
            .update::<Vec<Album>, _, _>(ALBUMS_KEY, |albums| albums.push(album.clone()))
            .await?;

        tracing::info!(
            album_id = %album.id,
            name = %album.name,
            photos = album.photo_ids.len(),
            "Album created"
        );
        Ok(album)
    }

    pub async fn list(&self) -> Result<Vec<Album>, AppError> {
        Ok(self.store.get(ALBUMS_KEY).await?.unwrap_or_default())
    }

    /// # Errors
    /// `NotFound` when no album has this id
    pub async fn get(&self, id: &str) -> Result<Album, AppError> {
        self.list()
            .await?
            .into_iter()
            .find(|album| album.id == id)
            .ok_or(AppError::NotFound)
    }
}
