//! Reference template images and the asset set the login flow draws from.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::GrayImage;
use tracing::{debug, info, warn};

use crate::errors::AutoLoginError;

/// Named reference image plus its default match threshold. Loaded once at
/// startup and shared read-only across all matches.
#[derive(Clone)]
pub struct Template {
    name: String,
    image: GrayImage,
    threshold: f64,
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        image: GrayImage,
        threshold: f64,
    ) -> Result<Self, AutoLoginError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AutoLoginError::InvalidArgument(format!(
                "match threshold must be within [0, 1], got {threshold}"
            )));
        }
        Ok(Self {
            name: name.into(),
            image,
            threshold,
        })
    }

    pub fn from_path(
        name: impl Into<String>,
        path: &Path,
        threshold: f64,
    ) -> Result<Self, AutoLoginError> {
        let image = image::open(path)
            .map_err(|e| {
                AutoLoginError::Config(format!(
                    "failed to load template image {}: {e}",
                    path.display()
                ))
            })?
            .to_luma8();
        Self::new(name, image, threshold)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub(crate) fn image(&self) -> &GrayImage {
        &self.image
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("threshold", &self.threshold)
            .finish()
    }
}

/// Default thresholds for the shipped assets.
pub const ENTER_GAME_THRESHOLD: f64 = 0.8;
pub const LOADING_CIRCLE_THRESHOLD: f64 = 0.7;
pub const USERNAME_FIELD_THRESHOLD: f64 = 0.7;
pub const PASSWORD_FIELD_THRESHOLD: f64 = 0.7;
pub const SUBMIT_BUTTON_THRESHOLD: f64 = 0.8;

/// The reference assets, loaded from the asset directory at startup.
///
/// The username and password field templates are required; a missing file is
/// a configuration error. Every other asset is optional and its absence
/// disables the step that uses it. The enter-game template doubles as the
/// needs-login detection template.
#[derive(Debug)]
pub struct TemplateSet {
    pub enter_game: Option<Arc<Template>>,
    pub loading_circle: Option<Arc<Template>>,
    pub username_field: Arc<Template>,
    pub password_field: Arc<Template>,
    pub submit_button: Option<Arc<Template>>,
}

impl TemplateSet {
    pub fn load(dir: &Path) -> Result<Self, AutoLoginError> {
        let set = Self {
            enter_game: load_optional(dir, "enter_game.png", "enter-game", ENTER_GAME_THRESHOLD)?,
            loading_circle: load_optional(
                dir,
                "loading_circle.png",
                "loading-circle",
                LOADING_CIRCLE_THRESHOLD,
            )?,
            username_field: load_required(
                dir,
                "username_field.png",
                "username-field",
                USERNAME_FIELD_THRESHOLD,
            )?,
            password_field: load_required(
                dir,
                "password_field.png",
                "password-field",
                PASSWORD_FIELD_THRESHOLD,
            )?,
            submit_button: load_optional(
                dir,
                "submit_button.png",
                "submit-button",
                SUBMIT_BUTTON_THRESHOLD,
            )?,
        };
        info!(dir = %dir.display(), "loaded template assets");
        Ok(set)
    }

    /// The template that decides whether a login prompt is on screen.
    pub fn needs_login(&self) -> Result<&Arc<Template>, AutoLoginError> {
        self.enter_game.as_ref().ok_or_else(|| {
            AutoLoginError::Config(
                "login detection needs the enter_game.png template asset".to_string(),
            )
        })
    }
}

fn load_required(
    dir: &Path,
    file: &str,
    name: &str,
    threshold: f64,
) -> Result<Arc<Template>, AutoLoginError> {
    let path = dir.join(file);
    if !path.exists() {
        return Err(AutoLoginError::Config(format!(
            "required template asset missing: {}",
            path.display()
        )));
    }
    let template = Template::from_path(name, &path, threshold)?;
    debug!(
        name,
        width = template.width(),
        height = template.height(),
        "loaded template"
    );
    Ok(Arc::new(template))
}

fn load_optional(
    dir: &Path,
    file: &str,
    name: &str,
    threshold: f64,
) -> Result<Option<Arc<Template>>, AutoLoginError> {
    let path = dir.join(file);
    if !path.exists() {
        warn!(
            name,
            path = %path.display(),
            "optional template asset missing, its step is disabled"
        );
        return Ok(None);
    }
    load_required(dir, file, name, threshold).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| image::Luma([((x + y) % 2 * 255) as u8]))
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = Template::new("t", checker(4), 1.5).unwrap_err();
        assert!(matches!(err, AutoLoginError::InvalidArgument(_)));
    }

    #[test]
    fn missing_required_asset_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateSet::load(dir.path()).unwrap_err();
        assert!(matches!(err, AutoLoginError::Config(_)));
    }

    #[test]
    fn optional_assets_may_be_absent() {
        let dir = tempfile::tempdir().unwrap();
        checker(8).save(dir.path().join("username_field.png")).unwrap();
        checker(8).save(dir.path().join("password_field.png")).unwrap();

        let set = TemplateSet::load(dir.path()).unwrap();
        assert!(set.enter_game.is_none());
        assert!(set.loading_circle.is_none());
        assert!(set.submit_button.is_none());
        assert_eq!(set.username_field.threshold(), USERNAME_FIELD_THRESHOLD);

        // Detection without the enter-game asset is a configuration error.
        assert!(matches!(
            set.needs_login().unwrap_err(),
            AutoLoginError::Config(_)
        ));
    }

    #[test]
    fn full_set_loads_with_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        for file in [
            "enter_game.png",
            "loading_circle.png",
            "username_field.png",
            "password_field.png",
            "submit_button.png",
        ] {
            checker(8).save(dir.path().join(file)).unwrap();
        }

        let set = TemplateSet::load(dir.path()).unwrap();
        assert_eq!(set.needs_login().unwrap().threshold(), ENTER_GAME_THRESHOLD);
        assert_eq!(
            set.loading_circle.as_ref().unwrap().threshold(),
            LOADING_CIRCLE_THRESHOLD
        );
        assert_eq!(
            set.submit_button.as_ref().unwrap().threshold(),
            SUBMIT_BUTTON_THRESHOLD
        );
    }
}
