// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/dataset.rs - 数据集清单
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const DEFAULT_ANNOTATIONS: &str = "annotations/instances_val2017.json";

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("数据集描述解析失败: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("图像文件缺失: {0}")]
  MissingImage(PathBuf),
  #[error("类别数量不匹配: 描述中 {found} 类, 模型 {expected} 类")]
  CategoryCount { found: usize, expected: usize },
  #[error("图像标识无法解析: {0}")]
  BadImageId(PathBuf),
}

#[derive(Debug, Deserialize)]
struct ManifestTable {
  dataset: ManifestFields,
}

#[derive(Debug, Deserialize)]
struct ManifestFields {
  /// 数据集根目录，缺省为描述文件所在目录
  path: Option<String>,
  /// 验证集图像列表文件（每行一个相对路径）
  val: String,
  /// 类别名称表
  names: Vec<String>,
}

/// 数据集描述：根目录、验证集列表与类别名称。
///
/// 描述文件为 TOML：
/// ```toml
/// [dataset]
/// path = "/data/coco"
/// val = "val2017.txt"
/// names = ["person", "bicycle", ...]
/// ```
#[derive(Debug)]
pub struct DatasetManifest {
  root: PathBuf,
  val_list: PathBuf,
  names: Vec<String>,
}

impl DatasetManifest {
  pub fn load(manifest_path: &Path) -> Result<Self, DatasetError> {
    let text = fs::read_to_string(manifest_path)?;
    let table: ManifestTable = toml::from_str(&text)?;

    let base = manifest_path.parent().unwrap_or(Path::new("."));
    let root = match table.dataset.path {
      Some(path) if Path::new(&path).is_absolute() => PathBuf::from(path),
      Some(path) => base.join(path),
      None => base.to_path_buf(),
    };
    let val_list = root.join(&table.dataset.val);
    debug!("数据集根目录: {}", root.display());

    Ok(DatasetManifest {
      root,
      val_list,
      names: table.dataset.names,
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn names(&self) -> &[String] {
    &self.names
  }

  /// 校验类别名称表与模型类别数一致
  pub fn validate_class_count(&self, expected: usize) -> Result<(), DatasetError> {
    if self.names.len() != expected {
      return Err(DatasetError::CategoryCount {
        found: self.names.len(),
        expected,
      });
    }
    Ok(())
  }

  /// 默认的标注文件位置（数据集根目录下的 COCO 标注）
  pub fn default_annotations(&self) -> PathBuf {
    self.root.join(DEFAULT_ANNOTATIONS)
  }

  /// 读取验证集图像列表并解析为存在的文件路径。
  /// 列表中的任何一张图像缺失都会让整次评估失败。
  pub fn val_images(&self) -> Result<Vec<PathBuf>, DatasetError> {
    let text = fs::read_to_string(&self.val_list)?;
    let mut images = Vec::new();

    for line in text.lines() {
      let line = line.trim();
      if line.is_empty() {
        continue;
      }
      let relative = line.trim_start_matches("./");
      let path = self.root.join(relative);
      if !path.is_file() {
        return Err(DatasetError::MissingImage(path));
      }
      images.push(path);
    }

    Ok(images)
  }
}

/// 图像标识约定：文件名主干解析为整数（如 000000000139.jpg -> 139）
pub fn image_id_from_path(path: &Path) -> Result<i64, DatasetError> {
  path
    .file_stem()
    .and_then(|stem| stem.to_str())
    .and_then(|stem| stem.parse::<i64>().ok())
    .ok_or_else(|| DatasetError::BadImageId(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs::File;
  use std::io::Write;

  #[test]
  fn image_id_strips_leading_zeros() {
    let id = image_id_from_path(Path::new("/data/val2017/000000000139.jpg")).unwrap();
    assert_eq!(id, 139);
  }

  #[test]
  fn non_numeric_stem_is_an_error() {
    assert!(matches!(
      image_id_from_path(Path::new("/data/val2017/kitchen.jpg")),
      Err(DatasetError::BadImageId(_))
    ));
  }

  #[test]
  fn manifest_resolves_and_checks_images() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    fs::create_dir(root.join("val2017")).unwrap();
    File::create(root.join("val2017/000000000001.jpg")).unwrap();
    File::create(root.join("val2017/000000000002.jpg")).unwrap();

    let mut list = File::create(root.join("val2017.txt")).unwrap();
    writeln!(list, "./val2017/000000000001.jpg").unwrap();
    writeln!(list, "./val2017/000000000002.jpg").unwrap();

    let manifest_path = root.join("coco.toml");
    fs::write(
      &manifest_path,
      r#"
[dataset]
val = "val2017.txt"
names = ["person", "bicycle"]
"#,
    )
    .unwrap();

    let manifest = DatasetManifest::load(&manifest_path).unwrap();
    assert_eq!(manifest.root(), root);
    assert!(manifest.validate_class_count(2).is_ok());
    assert!(matches!(
      manifest.validate_class_count(80),
      Err(DatasetError::CategoryCount { found: 2, expected: 80 })
    ));

    let images = manifest.val_images().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(image_id_from_path(&images[0]).unwrap(), 1);
  }

  #[test]
  fn missing_listed_image_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    fs::write(root.join("val2017.txt"), "./val2017/000000000404.jpg\n").unwrap();
    fs::write(
      root.join("coco.toml"),
      "[dataset]\nval = \"val2017.txt\"\nnames = [\"person\"]\n",
    )
    .unwrap();

    let manifest = DatasetManifest::load(&root.join("coco.toml")).unwrap();
    assert!(matches!(
      manifest.val_images(),
      Err(DatasetError::MissingImage(_))
    ));
  }
}
