//! crates/bite_core/src/draft.rs
//!
//! The recipe draft: the images a user has staged for the recipe they are
//! currently authoring. A `RecipeDraft` is owned by one authoring session and
//! dropped when that session ends; it is never shared.

use uuid::Uuid;

use crate::domain::{
    CreateRecipeInput, ImageRole, ImageUpdate, NewPendingImage, PendingImage,
};

/// Default cap on staged images per step.
pub const DEFAULT_MAX_STEP_IMAGES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("the draft already has a cover image")]
    CoverAlreadySet,
    #[error("step {step_index} already has {max} images")]
    StepFull { step_index: usize, max: usize },
    #[error("a step image needs a step index")]
    MissingStepIndex,
    #[error("image for step {step_index}, but the recipe has {steps} steps")]
    UnknownStep { step_index: usize, steps: usize },
}

/// Staged images for one recipe being authored, in insertion order.
#[derive(Debug, Clone)]
pub struct RecipeDraft {
    images: Vec<PendingImage>,
    max_step_images: usize,
}

impl Default for RecipeDraft {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEP_IMAGES)
    }
}

impl RecipeDraft {
    pub fn new(max_step_images: usize) -> Self {
        Self {
            images: Vec::new(),
            max_step_images,
        }
    }

    pub fn images(&self) -> &[PendingImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Stages an image and returns the id it was given.
    pub fn add_image(&mut self, image: NewPendingImage) -> Result<Uuid, DraftError> {
        let step_index = match image.role {
            ImageRole::Cover => {
                if !self.images_by_role(ImageRole::Cover).is_empty() {
                    return Err(DraftError::CoverAlreadySet);
                }
                None
            }
            ImageRole::Step => {
                let step_index = image.step_index.ok_or(DraftError::MissingStepIndex)?;
                if self.images_for_step(step_index).len() >= self.max_step_images {
                    return Err(DraftError::StepFull {
                        step_index,
                        max: self.max_step_images,
                    });
                }
                Some(step_index)
            }
        };

        let id = Uuid::new_v4();
        self.images.push(PendingImage {
            id,
            source: image.source,
            role: image.role,
            step_index,
            is_uploading: false,
            uploaded_url: None,
            error: None,
        });
        Ok(id)
    }

    /// Removes the image with `id`. Returns `false` if there was none.
    pub fn remove_image(&mut self, id: Uuid) -> bool {
        let before = self.images.len();
        self.images.retain(|img| img.id != id);
        self.images.len() != before
    }

    /// Merges `update` into the image with `id`. Returns `false` if there was none.
    pub fn update_image(&mut self, id: Uuid, update: ImageUpdate) -> bool {
        let Some(image) = self.images.iter_mut().find(|img| img.id == id) else {
            return false;
        };
        if let Some(is_uploading) = update.is_uploading {
            image.is_uploading = is_uploading;
        }
        if let Some(url) = update.uploaded_url {
            image.uploaded_url = Some(url);
        }
        if let Some(error) = update.error {
            image.error = Some(error);
        }
        true
    }

    pub fn clear_images(&mut self) {
        self.images.clear();
    }

    pub fn images_by_role(&self, role: ImageRole) -> Vec<&PendingImage> {
        self.images.iter().filter(|img| img.role == role).collect()
    }

    pub fn images_for_step(&self, step_index: usize) -> Vec<&PendingImage> {
        self.images
            .iter()
            .filter(|img| img.role == ImageRole::Step && img.step_index == Some(step_index))
            .collect()
    }

    /// Fails on the first step image whose index has no step in a recipe of `steps` steps.
    pub fn check_step_indexes(&self, steps: usize) -> Result<(), DraftError> {
        match self
            .images
            .iter()
            .filter_map(|img| img.step_index)
            .find(|&step_index| step_index >= steps)
        {
            Some(step_index) => Err(DraftError::UnknownStep { step_index, steps }),
            None => Ok(()),
        }
    }

    /// Writes the outcome of an upload batch back into the staged entries, matched by id.
    pub fn apply_results(&mut self, results: &[PendingImage]) {
        for result in results {
            self.update_image(
                result.id,
                ImageUpdate {
                    is_uploading: Some(result.is_uploading),
                    uploaded_url: result.uploaded_url.clone(),
                    error: result.error.clone(),
                },
            );
        }
    }
}

/// Fills in the cover and per-step image URLs of a submission from uploaded images.
///
/// Images without an uploaded URL (failed uploads) are skipped. Step images keep
/// the order in which they appear in `uploaded`.
pub fn attach_uploads(mut input: CreateRecipeInput, uploaded: &[PendingImage]) -> CreateRecipeInput {
    if let Some(url) = uploaded
        .iter()
        .filter(|img| img.role == ImageRole::Cover)
        .find_map(|img| img.uploaded_url.clone())
    {
        input.cover_image = Some(url);
    }

    for (index, step) in input.steps.iter_mut().enumerate() {
        step.images = uploaded
            .iter()
            .filter(|img| img.role == ImageRole::Step && img.step_index == Some(index))
            .filter_map(|img| img.uploaded_url.clone())
            .collect();
    }

    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StepInput;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_assigns_unique_ids_in_insertion_order() {
        let mut draft = RecipeDraft::default();
        let a = draft.add_image(NewPendingImage::step("/tmp/a.jpg", 0)).unwrap();
        let b = draft.add_image(NewPendingImage::cover("/tmp/b.jpg")).unwrap();
        let c = draft.add_image(NewPendingImage::step("/tmp/c.jpg", 0)).unwrap();

        assert_ne!(a, b);
        let ids: Vec<Uuid> = draft.images().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![a, b, c]);

        let step0: Vec<Uuid> = draft.images_for_step(0).iter().map(|i| i.id).collect();
        assert_eq!(step0, vec![a, c]);
        assert_eq!(draft.images_by_role(ImageRole::Cover).len(), 1);
    }

    #[test]
    fn only_one_cover_is_allowed() {
        let mut draft = RecipeDraft::default();
        draft.add_image(NewPendingImage::cover("/tmp/a.jpg")).unwrap();
        assert_eq!(
            draft.add_image(NewPendingImage::cover("/tmp/b.jpg")),
            Err(DraftError::CoverAlreadySet)
        );
        assert_eq!(draft.len(), 1);
    }

    #[test]
    fn step_images_are_capped_per_step() {
        let mut draft = RecipeDraft::new(2);
        draft.add_image(NewPendingImage::step("/tmp/1.jpg", 0)).unwrap();
        draft.add_image(NewPendingImage::step("/tmp/2.jpg", 0)).unwrap();
        assert_eq!(
            draft.add_image(NewPendingImage::step("/tmp/3.jpg", 0)),
            Err(DraftError::StepFull { step_index: 0, max: 2 })
        );
        // Another step is unaffected.
        assert!(draft.add_image(NewPendingImage::step("/tmp/3.jpg", 1)).is_ok());
    }

    #[test]
    fn step_image_without_index_is_rejected() {
        let mut draft = RecipeDraft::default();
        let image = NewPendingImage {
            source: "/tmp/a.jpg".into(),
            role: ImageRole::Step,
            step_index: None,
        };
        assert_eq!(draft.add_image(image), Err(DraftError::MissingStepIndex));
    }

    #[test]
    fn operations_on_unknown_ids_leave_the_draft_untouched() {
        let mut draft = RecipeDraft::default();
        draft.add_image(NewPendingImage::cover("/tmp/a.jpg")).unwrap();
        draft.add_image(NewPendingImage::step("/tmp/b.jpg", 1)).unwrap();
        let before = draft.images().to_vec();

        let missing = Uuid::new_v4();
        assert!(!draft.remove_image(missing));
        assert!(!draft.update_image(
            missing,
            ImageUpdate {
                error: Some("boom".to_string()),
                ..Default::default()
            }
        ));

        assert_eq!(draft.images(), before.as_slice());
    }

    #[test]
    fn update_merges_only_given_fields() {
        let mut draft = RecipeDraft::default();
        let id = draft.add_image(NewPendingImage::cover("/tmp/a.jpg")).unwrap();
        let other = draft.add_image(NewPendingImage::step("/tmp/b.jpg", 0)).unwrap();

        draft.update_image(
            id,
            ImageUpdate {
                is_uploading: Some(true),
                ..Default::default()
            },
        );
        draft.update_image(
            id,
            ImageUpdate {
                uploaded_url: Some("http://x/a.jpg".to_string()),
                ..Default::default()
            },
        );

        let image = &draft.images()[0];
        assert!(image.is_uploading);
        assert_eq!(image.uploaded_url.as_deref(), Some("http://x/a.jpg"));
        assert_eq!(image.error, None);
        assert!(draft.images().iter().any(|i| i.id == other && i.uploaded_url.is_none()));

        assert!(draft.remove_image(id));
        assert_eq!(draft.len(), 1);
        draft.clear_images();
        assert!(draft.is_empty());
    }

    #[test]
    fn step_images_must_point_at_an_existing_step() {
        let mut draft = RecipeDraft::default();
        draft.add_image(NewPendingImage::cover("/tmp/c.jpg")).unwrap();
        draft.add_image(NewPendingImage::step("/tmp/0.jpg", 0)).unwrap();
        draft.add_image(NewPendingImage::step("/tmp/5.jpg", 5)).unwrap();

        assert_eq!(draft.check_step_indexes(6), Ok(()));
        assert_eq!(
            draft.check_step_indexes(1),
            Err(DraftError::UnknownStep { step_index: 5, steps: 1 })
        );
        assert_eq!(RecipeDraft::default().check_step_indexes(0), Ok(()));
    }

    #[test]
    fn attach_uploads_places_urls_and_skips_failures() {
        let mut draft = RecipeDraft::default();
        let cover = draft.add_image(NewPendingImage::cover("/tmp/c.jpg")).unwrap();
        let s1a = draft.add_image(NewPendingImage::step("/tmp/1a.jpg", 1)).unwrap();
        let s1b = draft.add_image(NewPendingImage::step("/tmp/1b.jpg", 1)).unwrap();
        let s0 = draft.add_image(NewPendingImage::step("/tmp/0.jpg", 0)).unwrap();

        let mut results = draft.images().to_vec();
        for image in results.iter_mut() {
            if image.id == s0 {
                image.error = Some("Upload failed".to_string());
            } else {
                image.uploaded_url = Some(format!("http://cdn/{}", image.id));
            }
        }
        draft.apply_results(&results);

        let input = CreateRecipeInput {
            steps: vec![StepInput::default(), StepInput::default()],
            ..Default::default()
        };
        let input = attach_uploads(input, draft.images());

        assert_eq!(input.cover_image, Some(format!("http://cdn/{}", cover)));
        assert!(input.steps[0].images.is_empty());
        assert_eq!(
            input.steps[1].images,
            vec![format!("http://cdn/{}", s1a), format!("http://cdn/{}", s1b)]
        );
    }
}
