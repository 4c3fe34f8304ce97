use std::{fs, path::Path};

use crate::error::{Error, Result};
use crate::tree::copy_dir;

/// the project `clay new` writes when no template is given
const BLUEPRINT: &[(&str, &str)] = &[
    ("settings.yml", include_str!("../blueprint/settings.yml")),
    ("source/index.html", include_str!("../blueprint/source/index.html")),
    ("source/_layout.html", include_str!("../blueprint/source/_layout.html")),
    (
        "source/static/css/styles.css",
        include_str!("../blueprint/source/static/css/styles.css"),
    ),
];

fn is_empty_dir(path: &Path) -> Result<bool> {
    let mut entries = fs::read_dir(path).map_err(Error::with_path(path))?;
    Ok(entries.next().is_none())
}

/// start a project at `dest`, from the folder `template` or the blueprint
pub fn create_new<T: AsRef<Path>>(dest: T, template: Option<&Path>) -> Result<()> {
    let dest = dest.as_ref();
    if dest.exists() && !(dest.is_dir() && is_empty_dir(dest)?) {
        return Err(Error::DestinationNotEmpty(dest.to_path_buf()));
    }
    match template {
        Some(template) => {
            if !template.is_dir() {
                return Err(Error::SourceNotFound(template.to_path_buf()));
            }
            log::info!("Creating `{}` from `{}`", dest.display(), template.display());
            copy_dir(template, dest).map_err(Error::with_path(dest))?;
        }
        None => {
            log::info!("Creating `{}`", dest.display());
            for (name, content) in BLUEPRINT {
                let path = dest.join(name);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(Error::with_path(parent))?;
                }
                fs::write(&path, content).map_err(Error::with_path(&path))?;
            }
        }
    }
    Ok(())
}
