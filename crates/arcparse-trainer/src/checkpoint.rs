//! # Checkpoints
//!
//! A checkpoint is a single JSON document holding the [`ParserOptions`] the
//! model was built with and every named parameter tensor, flattened.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};
use crate::options::ParserOptions;

/// Name of the alias pointing at the first checkpoint of a run.
pub const LATEST_ALIAS: &str = "latest_model.params";

/// A flattened tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTensor {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl StoredTensor {
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Models whose parameters can be written to and restored from a checkpoint.
pub trait Checkpointable {
    fn parameters(&self) -> Result<BTreeMap<String, StoredTensor>>;

    fn load_parameters(&mut self, parameters: &BTreeMap<String, StoredTensor>) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub options: ParserOptions,
    pub parameters: BTreeMap<String, StoredTensor>,
}

impl Checkpoint {
    pub fn capture<M: Checkpointable + ?Sized>(options: ParserOptions, model: &M) -> Result<Self> {
        Ok(Self {
            options,
            parameters: model.parameters()?,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let io_err = |source| TrainError::CheckpointIo {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_err)?;
        self.write_to(BufWriter::new(file), path)
    }

    fn write_to<W: Write>(&self, mut writer: W, path: &Path) -> Result<()> {
        let io_err = |source| TrainError::CheckpointIo {
            path: path.to_path_buf(),
            source,
        };

        serde_json::to_writer(&mut writer, self).map_err(|e| {
            if e.is_io() {
                io_err(e.into())
            } else {
                TrainError::CorruptCheckpoint {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            }
        })?;
        writer.flush().map_err(io_err)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TrainError::CheckpointIo {
            path: path.to_path_buf(),
            source,
        })?;
        let checkpoint: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            TrainError::CorruptCheckpoint {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        for (name, tensor) in &checkpoint.parameters {
            if tensor.element_count() != tensor.values.len() {
                return Err(TrainError::CorruptCheckpoint {
                    path: path.to_path_buf(),
                    message: format!(
                        "parameter {name} has shape {:?} but {} values",
                        tensor.shape,
                        tensor.values.len()
                    ),
                });
            }
        }
        Ok(checkpoint)
    }
}

/// Options to build the model with: the stored ones when a checkpoint is
/// being loaded, the requested ones otherwise. The flag is set when the
/// stored options override a different request.
pub fn resolve_options(
    requested: ParserOptions,
    stored: Option<&ParserOptions>,
) -> (ParserOptions, bool) {
    match stored {
        Some(stored) => (*stored, *stored != requested),
        None => (requested, false),
    }
}

/// Point `latest_model.params` in the checkpoint's directory at it.
/// A no-op on platforms without symlinks.
pub fn link_latest(checkpoint: &Path) -> Result<PathBuf> {
    let dir = checkpoint.parent().unwrap_or_else(|| Path::new("."));
    let alias = dir.join(LATEST_ALIAS);

    #[cfg(unix)]
    {
        let target = checkpoint.file_name().unwrap_or(checkpoint.as_os_str());
        if alias.symlink_metadata().is_ok() {
            std::fs::remove_file(&alias).map_err(|source| TrainError::CheckpointIo {
                path: alias.clone(),
                source,
            })?;
        }
        std::os::unix::fs::symlink(target, &alias).map_err(|source| TrainError::CheckpointIo {
            path: alias.clone(),
            source,
        })?;
        tracing::info!(alias = %alias.display(), target = %checkpoint.display(), "linked latest model");
    }

    Ok(alias)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(BTreeMap<String, StoredTensor>);

    impl Checkpointable for Fixed {
        fn parameters(&self) -> Result<BTreeMap<String, StoredTensor>> {
            Ok(self.0.clone())
        }

        fn load_parameters(&mut self, parameters: &BTreeMap<String, StoredTensor>) -> Result<()> {
            self.0 = parameters.clone();
            Ok(())
        }
    }

    fn model() -> Fixed {
        let mut params = BTreeMap::new();
        params.insert(
            "out.weight".to_string(),
            StoredTensor {
                shape: vec![2, 3],
                values: vec![0.5, -1.0, 2.0, 0.0, 0.25, 3.5],
            },
        );
        Fixed(params)
    }

    #[test]
    fn saved_checkpoint_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.params");
        let options = ParserOptions {
            hidden_dim: 8,
            ..ParserOptions::default()
        };

        let saved = Checkpoint::capture(options, &model()).unwrap();
        saved.save(&path).unwrap();
        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(loaded, saved);

        let mut restored = Fixed(BTreeMap::new());
        restored.load_parameters(&loaded.parameters).unwrap();
        assert_eq!(restored.0, model().0);
    }

    #[test]
    fn truncated_checkpoint_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.params");
        std::fs::write(&path, "{\"options\":{\"use_pos\":").unwrap();

        let err = Checkpoint::load(&path).unwrap_err();
        assert!(matches!(err, TrainError::CorruptCheckpoint { .. }));
    }

    #[test]
    fn shape_value_disagreement_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.params");
        let mut bad = model();
        bad.0.get_mut("out.weight").unwrap().values.pop();
        Checkpoint::capture(ParserOptions::default(), &bad)
            .unwrap()
            .save(&path)
            .unwrap();

        let err = Checkpoint::load(&path).unwrap_err();
        assert!(err.to_string().contains("out.weight"));
    }

    #[test]
    fn missing_checkpoint_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Checkpoint::load(dir.path().join("absent.params")).unwrap_err();
        assert!(matches!(err, TrainError::CheckpointIo { .. }));
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no space left"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_io_error() {
        let checkpoint = Checkpoint::capture(ParserOptions::default(), &model()).unwrap();
        let err = checkpoint
            .write_to(FullDisk, Path::new("model.params"))
            .unwrap_err();
        assert!(matches!(err, TrainError::CheckpointIo { .. }));
    }

    #[test]
    fn save_into_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("model.params");
        let err = Checkpoint::capture(ParserOptions::default(), &model())
            .unwrap()
            .save(&path)
            .unwrap_err();
        assert!(matches!(err, TrainError::CheckpointIo { .. }));
    }

    #[test]
    fn stored_options_win() {
        let requested = ParserOptions::default();
        let stored = ParserOptions {
            use_pos: true,
            layers: 1,
            ..requested
        };
        assert_eq!(resolve_options(requested, Some(&stored)), (stored, true));
        assert_eq!(resolve_options(requested, Some(&requested)), (requested, false));
        assert_eq!(resolve_options(requested, None), (requested, false));
    }

    #[cfg(unix)]
    #[test]
    fn latest_alias_points_at_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parser_nopos-pid1.params");
        std::fs::write(&path, "{}").unwrap();

        let alias = link_latest(&path).unwrap();
        assert_eq!(alias, dir.path().join(LATEST_ALIAS));
        assert_eq!(std::fs::read_to_string(&alias).unwrap(), "{}");

        // relinking replaces the old alias
        let second = dir.path().join("parser_pos-pid1.params");
        std::fs::write(&second, "[]").unwrap();
        link_latest(&second).unwrap();
        assert_eq!(std::fs::read_to_string(&alias).unwrap(), "[]");
    }
}
