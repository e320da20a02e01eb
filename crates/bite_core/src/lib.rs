pub mod domain;
pub mod draft;
pub mod memory;
pub mod ports;
pub mod recipes;
pub mod upload;
pub mod validation;

pub use domain::{
    AuthSession, Category, CreateRecipeInput, ImageRole, ImageUpdate, Ingredient,
    IngredientInput, NewPendingImage, NewRecipe, PendingImage, Recipe, RecipeDetail, Step,
    StepImage, StepInput, StepWithImages, User, UserCredentials,
};
pub use draft::{attach_uploads, DraftError, RecipeDraft};
pub use memory::InMemoryDatabase;
pub use ports::{
    CompressOptions, CompressedImage, DatabaseService, ImageCompressor, ImageFormat,
    ObjectStorage, PortError, PortResult,
};
pub use recipes::RecipeService;
pub use upload::{UploadOptions, UploadPipeline, UploadProgress, UploadStatus};
pub use validation::{FieldError, ValidationErrors};
