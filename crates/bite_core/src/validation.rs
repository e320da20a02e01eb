//! Field-level validation for recipe submissions.

use std::fmt;

use crate::domain::CreateRecipeInput;

pub const MAX_TITLE_LEN: usize = 256;
pub const MAX_INGREDIENT_NAME_LEN: usize = 128;
pub const MAX_CATEGORY_NAME_LEN: usize = 128;
pub const MAX_COVER_IMAGE_LEN: usize = 512;

/// A single failed check, addressed by its field path (e.g. `ingredients[1].name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every field error found in one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

fn check_required(errors: &mut ValidationErrors, field: &str, value: &str, label: &str) {
    if value.trim().is_empty() {
        errors.push(field, format!("{} is required", label));
    }
}

fn check_max_len(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.push(field, format!("must be at most {} characters", max));
    }
}

impl CreateRecipeInput {
    /// Checks the whole submission and reports every problem at once.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        check_required(&mut errors, "title", &self.title, "Title");
        check_max_len(&mut errors, "title", self.title.trim(), MAX_TITLE_LEN);
        check_required(&mut errors, "description", &self.description, "Description");

        if let Some(cover) = &self.cover_image {
            check_max_len(&mut errors, "coverImage", cover, MAX_COVER_IMAGE_LEN);
        }

        if self.ingredients.is_empty() {
            errors.push("ingredients", "At least one ingredient is required");
        }
        for (i, ingredient) in self.ingredients.iter().enumerate() {
            let field = format!("ingredients[{}].name", i);
            check_required(&mut errors, &field, &ingredient.name, "Ingredient name");
            check_max_len(
                &mut errors,
                &field,
                ingredient.name.trim(),
                MAX_INGREDIENT_NAME_LEN,
            );
        }

        for (i, step) in self.steps.iter().enumerate() {
            check_required(
                &mut errors,
                &format!("steps[{}].instruction", i),
                &step.instruction,
                "Instruction",
            );
            for (j, url) in step.images.iter().enumerate() {
                if url.trim().is_empty() {
                    errors.push(format!("steps[{}].images[{}]", i, j), "Image URL is empty");
                }
            }
        }

        errors.into_result()
    }
}

/// Checks a category name before it is written.
pub fn validate_category_name(name: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_required(&mut errors, "name", name, "Name");
    check_max_len(&mut errors, "name", name.trim(), MAX_CATEGORY_NAME_LEN);
    errors.into_result()
}
